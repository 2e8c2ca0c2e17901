use futures_util::lock::Mutex;
use semver::Version;
use tracing::{debug, instrument, trace};

use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{DerivationPath, Network, TxAux},
};
use async_trait::async_trait;

use super::{
    transport::{open_transport, LedgerConnector, LedgerTransport},
    types::*,
};
use crate::{
    features::LEDGER_VERSIONS, AddressToPathMapper, BackendSignature, CryptoProviderConfig,
    CryptoProviderError, CryptoProviderFeature, ExtendedPublicKeySource, FeatureGate, RawWitness,
    SigningBackend,
};

/// The Ledger Cardano App.
///
/// This is a simple wrapper around a [`LedgerTransport`]. Calls are serialized on the transport.
#[derive(Debug)]
pub struct LedgerApp {
    transport: Mutex<Box<dyn LedgerTransport>>,
    features: FeatureGate,
    network: Network,
}

impl LedgerApp {
    /// Opens a transport, applies the exchange timeout and checks the app version.
    ///
    /// Fails with [`CryptoProviderError::FeatureUnsupported`] if the app is older than the
    /// minimal supported version.
    #[instrument(skip_all, fields(network = %network))]
    pub async fn connect(
        connector: &dyn LedgerConnector,
        network: Network,
        config: &CryptoProviderConfig,
    ) -> Result<Self, CryptoProviderError> {
        let mut transport = open_transport(connector, config.force_web_usb).await?;
        transport.set_exchange_timeout(config.exchange_timeout);

        let version = Self::version_with_transport(transport.as_ref()).await?;
        debug!(%version, "connected to ledger cardano app");
        let features = FeatureGate::new(version, LEDGER_VERSIONS)?;
        features.ensure_supported(CryptoProviderFeature::Minimal)?;

        Ok(Self { transport: Mutex::new(transport), features, network })
    }

    pub fn features(&self) -> &FeatureGate {
        &self.features
    }

    /// Version of the app, as read at connection time
    pub fn version(&self) -> &Version {
        self.features.version()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    async fn version_with_transport(
        transport: &dyn LedgerTransport,
    ) -> Result<Version, CryptoProviderError> {
        match Self::exchange_with_transport(transport, &LedgerRequest::GetVersion).await? {
            LedgerResponse::Version(LedgerVersion { major, minor, patch }) => {
                Ok(Version::new(major, minor, patch))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn exchange_with_transport(
        transport: &dyn LedgerTransport,
        request: &LedgerRequest,
    ) -> Result<LedgerResponse, CryptoProviderError> {
        trace!(?request, "ledger exchange");
        match transport.exchange(request).await? {
            LedgerResponse::Failure { name, message } => {
                debug!(%name, %message, "ledger refused request");
                Err(CryptoProviderError::BackendOperationFailed(format!("{name}: {message}")))
            }
            response => Ok(response),
        }
    }

    async fn exchange(
        &self,
        request: &LedgerRequest,
    ) -> Result<LedgerResponse, CryptoProviderError> {
        let transport = self.transport.lock().await;
        Self::exchange_with_transport(transport.as_ref(), request).await
    }

    /// Exports the key of one hardened path
    pub async fn get_extended_public_key(
        &self,
        path: &DerivationPath,
    ) -> Result<ExtendedPublicKey, CryptoProviderError> {
        let request = LedgerRequest::GetExtendedPublicKey { path: path.clone() };
        let mut keys = Self::parse_keys(self.exchange(&request).await?)?;
        match (keys.pop(), keys.is_empty()) {
            (Some(key), true) => Ok(key),
            _ => Err(CryptoProviderError::UnexpectedResponse(
                "expected exactly one public key".into(),
            )),
        }
    }

    /// Exports the keys of several hardened paths in one exchange
    pub async fn get_extended_public_keys(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        self.features.ensure_supported(CryptoProviderFeature::BulkExport)?;
        let request = LedgerRequest::GetExtendedPublicKeys { paths: paths.to_vec() };
        Self::parse_keys(self.exchange(&request).await?)
    }

    fn parse_keys(response: LedgerResponse) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        match response {
            LedgerResponse::ExtendedPublicKeys(keys) => keys
                .into_iter()
                .map(|key| -> Result<_, CryptoProviderError> {
                    let mut bytes = hex::decode(&key.public_key_hex)?;
                    bytes.extend(hex::decode(&key.chain_code_hex)?);
                    Ok(ExtendedPublicKey::from_bytes(&bytes)?)
                })
                .collect(),
            other => Err(unexpected(other)),
        }
    }

    /// Shows an address on the device (requires confirmation on the ledger)
    pub async fn show_address(
        &self,
        address_type_nibble: AddressTypeNibble,
        spending_path: &DerivationPath,
        staking_path: Option<&DerivationPath>,
    ) -> Result<(), CryptoProviderError> {
        let request = LedgerRequest::ShowAddress {
            address_type_nibble,
            network_id: self.network.network_id.into(),
            spending_path: spending_path.clone(),
            staking_path: staking_path.cloned(),
        };
        match self.exchange(&request).await? {
            LedgerResponse::AddressShown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Signs a transaction (requires confirmation on the ledger)
    pub async fn sign_transaction(
        &self,
        request: LedgerSignTxRequest,
    ) -> Result<LedgerSignTransactionResponse, CryptoProviderError> {
        match self.exchange(&LedgerRequest::SignTransaction(request)).await? {
            LedgerResponse::SignedTransaction(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: LedgerResponse) -> CryptoProviderError {
    CryptoProviderError::UnexpectedResponse(format!("{response:?}"))
}

#[async_trait]
impl ExtendedPublicKeySource for LedgerApp {
    async fn export_xpubs(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        if paths.len() > 1 && self.features.is_supported(CryptoProviderFeature::BulkExport) {
            return self.get_extended_public_keys(paths).await
        }
        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            keys.push(self.get_extended_public_key(path).await?);
        }
        Ok(keys)
    }
}

#[async_trait]
impl SigningBackend for LedgerApp {
    type Request = LedgerSignTxRequest;

    fn translate(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<Self::Request, CryptoProviderError> {
        LedgerSignTxRequest::load(tx, mapper, &self.network)
    }

    async fn sign_request(
        &self,
        request: Self::Request,
    ) -> Result<BackendSignature, CryptoProviderError> {
        let response = self.sign_transaction(request).await?;
        let witnesses = response
            .witnesses
            .into_iter()
            .map(|witness| -> Result<_, CryptoProviderError> {
                Ok(RawWitness {
                    path: witness.path,
                    signature: hex::decode(&witness.witness_signature_hex)?.into(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(BackendSignature { tx_hash: response.tx_hash_hex, witnesses })
    }
}
