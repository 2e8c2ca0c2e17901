use crate::{
    AddressToPathMapper, CryptoProviderError, CryptoProviderFeature, DerivationScheme,
    FeatureGate, LedgerCryptoProvider, Signer, TrezorCryptoProvider, WalletSecret,
    WalletSecretCryptoProvider,
};
use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{Bytes, DerivationPath, Network, SignedTx, TxAux},
};
use async_trait::async_trait;

/// Every supported backend kind
#[derive(Debug)]
pub enum CryptoProvider {
    Ledger(LedgerCryptoProvider),
    Trezor(TrezorCryptoProvider),
    WalletSecret(WalletSecretCryptoProvider),
}

macro_rules! dispatch {
    ($self:ident, $provider:ident => $body:expr) => {
        match $self {
            CryptoProvider::Ledger($provider) => $body,
            CryptoProvider::Trezor($provider) => $body,
            CryptoProvider::WalletSecret($provider) => $body,
        }
    };
}

impl From<LedgerCryptoProvider> for CryptoProvider {
    fn from(provider: LedgerCryptoProvider) -> Self {
        CryptoProvider::Ledger(provider)
    }
}

impl From<TrezorCryptoProvider> for CryptoProvider {
    fn from(provider: TrezorCryptoProvider) -> Self {
        CryptoProvider::Trezor(provider)
    }
}

impl From<WalletSecretCryptoProvider> for CryptoProvider {
    fn from(provider: WalletSecretCryptoProvider) -> Self {
        CryptoProvider::WalletSecret(provider)
    }
}

#[async_trait]
impl Signer for CryptoProvider {
    fn network(&self) -> &Network {
        dispatch!(self, provider => provider.network())
    }

    fn wallet_name(&self) -> &'static str {
        dispatch!(self, provider => provider.wallet_name())
    }

    fn is_hw_wallet(&self) -> bool {
        dispatch!(self, provider => provider.is_hw_wallet())
    }

    fn derivation_scheme(&self) -> DerivationScheme {
        dispatch!(self, provider => provider.derivation_scheme())
    }

    fn features(&self) -> &FeatureGate {
        dispatch!(self, provider => provider.features())
    }

    fn is_feature_supported(&self, feature: CryptoProviderFeature) -> bool {
        dispatch!(self, provider => provider.is_feature_supported(feature))
    }

    async fn derive_xpub(
        &self,
        path: &DerivationPath,
    ) -> Result<ExtendedPublicKey, CryptoProviderError> {
        dispatch!(self, provider => provider.derive_xpub(path).await)
    }

    async fn display_address_for_path(
        &self,
        spending_path: &DerivationPath,
        staking_path: Option<&DerivationPath>,
    ) -> Result<(), CryptoProviderError> {
        dispatch!(self, provider => {
            provider.display_address_for_path(spending_path, staking_path).await
        })
    }

    async fn sign_tx(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<SignedTx, CryptoProviderError> {
        dispatch!(self, provider => provider.sign_tx(tx, mapper).await)
    }

    fn wallet_secret(&self) -> Result<&WalletSecret, CryptoProviderError> {
        dispatch!(self, provider => provider.wallet_secret())
    }

    fn hd_passphrase(&self) -> Result<[u8; 32], CryptoProviderError> {
        dispatch!(self, provider => provider.hd_passphrase())
    }

    async fn sign(
        &self,
        message: &[u8],
        path: &DerivationPath,
    ) -> Result<Bytes, CryptoProviderError> {
        dispatch!(self, provider => provider.sign(message, path).await)
    }
}
