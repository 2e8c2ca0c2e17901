use futures_util::lock::Mutex;
use semver::Version;
use tracing::{debug, instrument, trace};

use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{DerivationPath, Network, TxAux},
};
use async_trait::async_trait;

use super::{transport::TrezorTransport, types::*};
use crate::{
    features::TREZOR_VERSIONS, AddressToPathMapper, BackendSignature, CryptoProviderConfig,
    CryptoProviderError, CryptoProviderFeature, ExtendedPublicKeySource, FeatureGate, RawWitness,
    SigningBackend,
};

/// A Trezor running the Cardano firmware, reached through Trezor Connect.
#[derive(Debug)]
pub struct TrezorApp {
    transport: Mutex<Box<dyn TrezorTransport>>,
    features: FeatureGate,
    network: Network,
}

impl TrezorApp {
    /// Registers the manifest and checks the firmware version.
    ///
    /// A bridge that cannot be reached fails with [`CryptoProviderError::TransportUnavailable`].
    #[instrument(skip_all, fields(network = %network))]
    pub async fn connect(
        mut transport: Box<dyn TrezorTransport>,
        network: Network,
        config: &CryptoProviderConfig,
    ) -> Result<Self, CryptoProviderError> {
        transport.manifest(&config.trezor_manifest);

        let response = transport
            .call(&TrezorRequest::GetFeatures)
            .await
            .map_err(CryptoProviderError::TransportUnavailable)?;
        let version = match response.into_payload()? {
            TrezorPayload::Features(TrezorFeatures {
                major_version,
                minor_version,
                patch_version,
            }) => Version::new(major_version, minor_version, patch_version),
            other => return Err(unexpected(other)),
        };
        debug!(%version, "connected to trezor");

        let features = FeatureGate::new(version, TREZOR_VERSIONS)?;
        features.ensure_supported(CryptoProviderFeature::Minimal)?;

        Ok(Self { transport: Mutex::new(transport), features, network })
    }

    pub fn features(&self) -> &FeatureGate {
        &self.features
    }

    /// Firmware version, as read at connection time
    pub fn version(&self) -> &Version {
        self.features.version()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    async fn call(&self, request: &TrezorRequest) -> Result<TrezorPayload, CryptoProviderError> {
        let transport = self.transport.lock().await;
        trace!(?request, "trezor call");
        transport.call(request).await?.into_payload()
    }

    /// Exports the keys of `paths` as one bundle
    pub async fn get_public_keys(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        let bundle = paths
            .iter()
            .map(|path| TrezorPublicKeyParams { path: path.clone(), show_on_trezor: false })
            .collect();
        match self.call(&TrezorRequest::CardanoGetPublicKey { bundle }).await? {
            TrezorPayload::PublicKeys(keys) => keys
                .into_iter()
                .map(|key| -> Result<_, CryptoProviderError> {
                    Ok(ExtendedPublicKey::from_bytes(&hex::decode(&key.public_key)?)?)
                })
                .collect(),
            other => Err(unexpected(other)),
        }
    }

    /// Shows an address on the device, returning the address text
    pub async fn show_address(
        &self,
        address_parameters: TrezorAddressParameters,
    ) -> Result<String, CryptoProviderError> {
        let request = TrezorRequest::CardanoGetAddress {
            address_parameters,
            network_id: self.network.network_id.into(),
            protocol_magic: self.network.protocol_magic,
            show_on_trezor: true,
        };
        match self.call(&request).await? {
            TrezorPayload::Address { address } => Ok(address),
            other => Err(unexpected(other)),
        }
    }

    /// Signs a transaction (requires confirmation on the trezor)
    pub async fn sign_transaction(
        &self,
        request: TrezorSignTxRequest,
    ) -> Result<TrezorSignedTx, CryptoProviderError> {
        match self.call(&TrezorRequest::CardanoSignTransaction(request)).await? {
            TrezorPayload::SignedTx(signed) => Ok(signed),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(payload: TrezorPayload) -> CryptoProviderError {
    CryptoProviderError::UnexpectedResponse(format!("{payload:?}"))
}

#[async_trait]
impl ExtendedPublicKeySource for TrezorApp {
    async fn export_xpubs(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        self.get_public_keys(paths).await
    }
}

#[async_trait]
impl SigningBackend for TrezorApp {
    type Request = TrezorSignTxRequest;

    fn translate(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<Self::Request, CryptoProviderError> {
        TrezorSignTxRequest::load(tx, mapper, &self.network)
    }

    async fn sign_request(
        &self,
        request: Self::Request,
    ) -> Result<BackendSignature, CryptoProviderError> {
        let signed = self.sign_transaction(request).await?;
        let witnesses = signed
            .witnesses
            .into_iter()
            .map(|witness| -> Result<_, CryptoProviderError> {
                let signature = hex::decode(&witness.signature)?.into();
                Ok(RawWitness { path: witness.path, signature })
            })
            .collect::<Result<_, _>>()?;
        Ok(BackendSignature { tx_hash: signed.hash, witnesses })
    }
}
