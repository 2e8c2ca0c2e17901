//! A unified interface for signing Cardano transactions on different key holders.
//!
//! You can implement the `Signer` trait to extend functionality to other backends.
//!
//! Supported backends:
//! - Ledger
//! - Trezor
//! - Wallet secret held in memory
//!
//! Every backend signs through the same flow: the transaction is projected onto the backend's
//! wire shape, signed, and the identifier the backend reports is compared with the one computed
//! locally. A signed transaction is only returned when the two agree.
//!
//! ```no_run
//! # use adasign_signers::{create_crypto_provider, CryptoProviderOptions, Signer, WalletSecret};
//! # use adasign_core::types::{Address, DerivationPath, Network, TxAux};
//! # async fn foo(tx: TxAux) -> Result<(), Box<dyn std::error::Error>> {
//! let secret = WalletSecret::from_mnemonic(
//!     "test walk nut penalty hip pave soap entry language right filter choice",
//!     "",
//! )?;
//! let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret);
//! let provider = create_crypto_provider("WALLET_SECRET", options).await?;
//!
//! let xpub = provider.derive_xpub(&DerivationPath::shelley_account(0)).await?;
//! let signed = provider.sign_tx(&tx, &|_: &Address| None::<DerivationPath>).await?;
//! assert_eq!(signed.tx_hash, tx.id()?.to_string());
//! # let _ = xpub;
//! # Ok(())
//! # }
//! ```
mod config;
pub use config::{CryptoProviderConfig, TrezorManifest, DEFAULT_EXCHANGE_TIMEOUT};

mod error;
pub use error::{CryptoProviderError, TransportError};

pub mod derivation;
pub use derivation::{CachedDeriveXpub, DerivationScheme, ExtendedPublicKeySource};

pub mod features;
pub use features::{CryptoProviderFeature, FeatureGate};

pub mod orchestrator;
pub use orchestrator::{BackendSignature, SigningBackend};

pub mod witness;
pub use witness::{assemble_witnesses, RawWitness};

pub mod ledger;
pub use ledger::{LedgerConnector, LedgerCryptoProvider, LedgerTransport};

pub mod trezor;
pub use trezor::{TrezorCryptoProvider, TrezorTransport};

mod wallet;
pub use wallet::{
    MnemonicBuilder, WalletSecret, WalletSecretCryptoProvider, WalletSecretSignRequest,
};

mod provider;
pub use provider::CryptoProvider;

mod factory;
pub use factory::{create_crypto_provider, CryptoProviderOptions, CryptoProviderType};

pub mod mock;

use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{Address, Bytes, DerivationPath, Network, SignedTx, TxAux},
};
use async_trait::async_trait;

/// Resolves wallet owned addresses to the derivation path of their key
pub trait AddressToPathMapper: Send + Sync {
    /// Returns `None` for addresses the wallet does not own
    fn path_for(&self, address: &Address) -> Option<DerivationPath>;

    /// Like [`path_for`](Self::path_for), for addresses the wallet must own
    fn require_path(&self, address: &Address) -> Result<DerivationPath, CryptoProviderError> {
        self.path_for(address)
            .ok_or_else(|| CryptoProviderError::MissingDerivationPath(address.clone()))
    }
}

impl<F> AddressToPathMapper for F
where
    F: Fn(&Address) -> Option<DerivationPath> + Send + Sync,
{
    fn path_for(&self, address: &Address) -> Option<DerivationPath> {
        self(address)
    }
}

/// Trait for deriving keys and signing transactions
///
/// Implement this trait to support different key holders, e.g. hardware wallets, remote signers
/// etc. Operations a backend does not offer fail with
/// [`CryptoProviderError::UnsupportedOperation`] without touching the device.
#[async_trait]
pub trait Signer: std::fmt::Debug + Send + Sync {
    fn network(&self) -> &Network;

    /// Name of the backend kind, e.g. `"Ledger"`
    fn wallet_name(&self) -> &'static str;

    fn is_hw_wallet(&self) -> bool;

    fn derivation_scheme(&self) -> DerivationScheme {
        DerivationScheme::V2
    }

    /// The features the backend supports, fixed at construction
    fn features(&self) -> &FeatureGate;

    fn is_feature_supported(&self, feature: CryptoProviderFeature) -> bool {
        self.features().is_supported(feature)
    }

    fn ensure_feature_supported(
        &self,
        feature: CryptoProviderFeature,
    ) -> Result<(), CryptoProviderError> {
        self.features().ensure_supported(feature)
    }

    /// Extended public key of `path`, cached for the lifetime of the provider
    async fn derive_xpub(
        &self,
        path: &DerivationPath,
    ) -> Result<ExtendedPublicKey, CryptoProviderError>;

    /// Shows the address of the given keys on the device for the user to check
    async fn display_address_for_path(
        &self,
        _spending_path: &DerivationPath,
        _staking_path: Option<&DerivationPath>,
    ) -> Result<(), CryptoProviderError> {
        Err(CryptoProviderError::UnsupportedOperation("display_address_for_path"))
    }

    /// Signs the transaction and returns it encoded with its witnesses
    async fn sign_tx(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<SignedTx, CryptoProviderError>;

    /// The root secret, for backends that hold one in memory
    fn wallet_secret(&self) -> Result<&WalletSecret, CryptoProviderError> {
        Err(CryptoProviderError::UnsupportedOperation("wallet_secret"))
    }

    /// Passphrase encrypting the derivation paths of legacy Byron addresses
    fn hd_passphrase(&self) -> Result<[u8; 32], CryptoProviderError> {
        Err(CryptoProviderError::UnsupportedOperation("hd_passphrase"))
    }

    /// Signs an arbitrary message with the key at `path`
    async fn sign(
        &self,
        _message: &[u8],
        _path: &DerivationPath,
    ) -> Result<Bytes, CryptoProviderError> {
        Err(CryptoProviderError::UnsupportedOperation("sign"))
    }
}
