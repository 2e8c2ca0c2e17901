use crate::{
    CryptoProvider, CryptoProviderConfig, CryptoProviderError, LedgerConnector,
    LedgerCryptoProvider, TrezorCryptoProvider, TrezorTransport, WalletSecret,
    WalletSecretCryptoProvider,
};
use adasign_core::types::Network;
use std::fmt;
use strum::{Display, EnumString};
use tracing::{debug, instrument};

/// Backend kinds known to [`create_crypto_provider`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoProviderType {
    Ledger,
    Trezor,
    WalletSecret,
}

/// What the factory needs to build a provider. Only the option of the requested kind is used.
pub struct CryptoProviderOptions {
    pub network: Network,
    pub config: CryptoProviderConfig,
    pub ledger: Option<Box<dyn LedgerConnector>>,
    pub trezor: Option<Box<dyn TrezorTransport>>,
    pub wallet_secret: Option<WalletSecret>,
}

impl fmt::Debug for CryptoProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoProviderOptions")
            .field("network", &self.network.name)
            .field("config", &self.config)
            .field("ledger", &self.ledger.is_some())
            .field("trezor", &self.trezor.is_some())
            .field("wallet_secret", &self.wallet_secret.is_some())
            .finish()
    }
}

impl CryptoProviderOptions {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            config: CryptoProviderConfig::default(),
            ledger: None,
            trezor: None,
            wallet_secret: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: CryptoProviderConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn ledger(mut self, connector: impl LedgerConnector + 'static) -> Self {
        self.ledger = Some(Box::new(connector));
        self
    }

    #[must_use]
    pub fn trezor(mut self, transport: impl TrezorTransport + 'static) -> Self {
        self.trezor = Some(Box::new(transport));
        self
    }

    #[must_use]
    pub fn wallet_secret(mut self, secret: WalletSecret) -> Self {
        self.wallet_secret = Some(secret);
        self
    }
}

impl CryptoProvider {
    /// Builds a provider of `kind`, connecting to the device for hardware kinds
    pub async fn create(
        kind: CryptoProviderType,
        options: CryptoProviderOptions,
    ) -> Result<Self, CryptoProviderError> {
        let CryptoProviderOptions { network, config, ledger, trezor, wallet_secret } = options;
        Ok(match kind {
            CryptoProviderType::Ledger => {
                let connector = ledger.ok_or(CryptoProviderError::MissingOption("ledger"))?;
                LedgerCryptoProvider::new(connector.as_ref(), network, &config).await?.into()
            }
            CryptoProviderType::Trezor => {
                let transport = trezor.ok_or(CryptoProviderError::MissingOption("trezor"))?;
                TrezorCryptoProvider::new(transport, network, &config).await?.into()
            }
            CryptoProviderType::WalletSecret => {
                let secret =
                    wallet_secret.ok_or(CryptoProviderError::MissingOption("wallet_secret"))?;
                WalletSecretCryptoProvider::new(secret, network).into()
            }
        })
    }
}

/// Builds a provider from its kind name: `LEDGER`, `TREZOR` or `WALLET_SECRET`.
///
/// Unknown names fail with [`CryptoProviderError::UnsupportedProviderKind`].
#[instrument(skip(options))]
pub async fn create_crypto_provider(
    kind: &str,
    options: CryptoProviderOptions,
) -> Result<CryptoProvider, CryptoProviderError> {
    let kind: CryptoProviderType =
        kind.parse().map_err(|_| CryptoProviderError::UnsupportedProviderKind(kind.to_owned()))?;
    debug!(%kind, "creating crypto provider");
    CryptoProvider::create(kind, options).await
}
