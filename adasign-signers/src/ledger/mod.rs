pub mod app;
pub mod transport;
pub mod types;

pub use app::LedgerApp;
pub use transport::{open_transport, LedgerChannel, LedgerConnector, LedgerTransport};
pub use types::{
    AddressTypeNibble, LedgerRequest, LedgerResponse, LedgerSignTxRequest, LedgerVersion,
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

/// Crypto provider backed by the Ledger Cardano app
#[derive(Debug)]
pub struct LedgerCryptoProvider {
    app: LedgerApp,
    xpubs: CachedDeriveXpub,
}

impl LedgerCryptoProvider {
    /// Connects to the device. Bulk key export is used when both the configuration asks for it
    /// and the app supports it.
    pub async fn new(
        connector: &dyn LedgerConnector,
        network: Network,
        config: &CryptoProviderConfig,
    ) -> Result<Self, CryptoProviderError> {
        let app = LedgerApp::connect(connector, network, config).await?;
        let bulk_export = config.should_export_pub_key_bulk &&
            app.features().is_supported(CryptoProviderFeature::BulkExport);
        Ok(Self { app, xpubs: CachedDeriveXpub::new(bulk_export) })
    }

    pub fn app(&self) -> &LedgerApp {
        &self.app
    }
}

#[async_trait]
impl Signer for LedgerCryptoProvider {
    fn network(&self) -> &Network {
        self.app.network()
    }

    fn wallet_name(&self) -> &'static str {
        "Ledger"
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
        let nibble = match (spending_path.era(), staking_path) {
            (AddressEra::Byron, _) => {
                self.ensure_feature_supported(CryptoProviderFeature::ByronAddressDisplay)?;
                AddressTypeNibble::Byron
            }
            (AddressEra::Shelley, Some(_)) => AddressTypeNibble::Base,
            (AddressEra::Shelley, None) => AddressTypeNibble::Enterprise,
        };
        let staking_path = staking_path.filter(|_| nibble == AddressTypeNibble::Base);
        self.app.show_address(nibble, spending_path, staking_path).await
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
