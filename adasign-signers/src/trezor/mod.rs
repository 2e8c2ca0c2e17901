pub mod app;
pub mod transport;
pub mod types;

pub use app::TrezorApp;
pub use transport::TrezorTransport;
pub use types::{
    TrezorAddressParameters, TrezorAddressType, TrezorPayload, TrezorRequest, TrezorResponse,
    TrezorSignTxRequest,
};

use crate::{
    orchestrator, AddressToPathMapper, CachedDeriveXpub, CryptoProviderConfig,
    CryptoProviderError, CryptoProviderFeature, FeatureGate, Signer,
};
use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{AddressEra, DerivationPath, Network, SignedTx, TxAux},
};
use async_trait::async_trait;
use tracing::debug;

/// Crypto provider backed by a Trezor
#[derive(Debug)]
pub struct TrezorCryptoProvider {
    app: TrezorApp,
    xpubs: CachedDeriveXpub,
}

impl TrezorCryptoProvider {
    pub async fn new(
        transport: Box<dyn TrezorTransport>,
        network: Network,
        config: &CryptoProviderConfig,
    ) -> Result<Self, CryptoProviderError> {
        let app = TrezorApp::connect(transport, network, config).await?;
        Ok(Self { app, xpubs: CachedDeriveXpub::new(config.should_export_pub_key_bulk) })
    }

    pub fn app(&self) -> &TrezorApp {
        &self.app
    }
}

#[async_trait]
impl Signer for TrezorCryptoProvider {
    fn network(&self) -> &Network {
        self.app.network()
    }

    fn wallet_name(&self) -> &'static str {
        "Trezor"
    }

    fn is_hw_wallet(&self) -> bool {
        true
    }

    fn features(&self) -> &FeatureGate {
        self.app.features()
    }

    async fn derive_xpub(
        &self,
        path: &DerivationPath,
    ) -> Result<ExtendedPublicKey, CryptoProviderError> {
        self.xpubs.derive(path, &self.app).await
    }

    async fn display_address_for_path(
        &self,
        spending_path: &DerivationPath,
        staking_path: Option<&DerivationPath>,
    ) -> Result<(), CryptoProviderError> {
        let address_type = match (spending_path.era(), staking_path) {
            (AddressEra::Byron, _) => {
                self.ensure_feature_supported(CryptoProviderFeature::ByronAddressDisplay)?;
                TrezorAddressType::Byron
            }
            (AddressEra::Shelley, Some(_)) => TrezorAddressType::Base,
            (AddressEra::Shelley, None) => TrezorAddressType::Enterprise,
        };
        let address_parameters = TrezorAddressParameters {
            address_type,
            path: spending_path.clone(),
            staking_path: staking_path
                .filter(|_| address_type == TrezorAddressType::Base)
                .cloned(),
        };
        let address = self.app.show_address(address_parameters).await?;
        debug!(%address, "address shown on trezor");
        Ok(())
    }

    async fn sign_tx(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<SignedTx, CryptoProviderError> {
        orchestrator::sign_tx(
            &self.app,
            self.app.features(),
            &self.xpubs,
            self.app.network(),
            tx,
            mapper,
        )
        .await
    }
}
