//! The signing flow shared by every backend: translate, sign, verify, assemble, encode.
use crate::{
    derivation::{CachedDeriveXpub, ExtendedPublicKeySource},
    features::{CryptoProviderFeature, FeatureGate},
    witness::{assemble_witnesses, RawWitness},
    AddressToPathMapper, CryptoProviderError,
};
use adasign_core::types::{Network, SignedTransactionStructured, SignedTx, TxAux, TxHash};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// What a backend returns after signing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSignature {
    /// Identifier of the transaction the backend serialized, as hex
    pub tx_hash: String,
    pub witnesses: Vec<RawWitness>,
}

/// A backend's native signing operation
#[async_trait]
pub trait SigningBackend: ExtendedPublicKeySource {
    /// Backend specific request
    type Request: Send + Sync;

    /// Projects the transaction onto the backend's wire shape
    fn translate(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<Self::Request, CryptoProviderError>;

    /// Runs the signing operation. May wait on user confirmation; a rejection is terminal.
    async fn sign_request(
        &self,
        request: Self::Request,
    ) -> Result<BackendSignature, CryptoProviderError>;
}

/// Checks that the transaction only uses features the backend supports
pub fn ensure_tx_supported(features: &FeatureGate, tx: &TxAux) -> Result<(), CryptoProviderError> {
    if tx.has_pool_registration() {
        features.ensure_supported(CryptoProviderFeature::PoolRegistration)?;
    }
    if tx.has_tokens() {
        features.ensure_supported(CryptoProviderFeature::MultiAsset)?;
    }
    Ok(())
}

/// Compares the backend's reported identifier with the locally computed one
pub fn verify_tx_hash(tx: &TxAux, reported: &str) -> Result<TxHash, CryptoProviderError> {
    let expected = tx.id()?;
    match reported.parse::<TxHash>() {
        Ok(hash) if hash == expected => Ok(expected),
        _ => {
            warn!(%expected, reported, "backend serialized a different transaction");
            Err(CryptoProviderError::TxSerializationMismatch {
                expected,
                reported: reported.to_owned(),
            })
        }
    }
}

/// Signs `tx` on `backend` and returns the encoded signed transaction.
///
/// Nothing is returned unless the identifier reported by the backend equals [`TxAux::id`].
#[instrument(skip_all, fields(inputs = tx.inputs.len(), outputs = tx.outputs.len()))]
pub async fn sign_tx<B>(
    backend: &B,
    features: &FeatureGate,
    xpubs: &CachedDeriveXpub,
    network: &Network,
    tx: &TxAux,
    mapper: &dyn AddressToPathMapper,
) -> Result<SignedTx, CryptoProviderError>
where
    B: SigningBackend + ?Sized,
{
    ensure_tx_supported(features, tx)?;
    let request = backend.translate(tx, mapper)?;
    let signature = backend.sign_request(request).await?;
    let tx_hash = verify_tx_hash(tx, &signature.tx_hash)?;
    debug!(%tx_hash, witnesses = signature.witnesses.len(), "backend signed transaction");

    let witnesses = assemble_witnesses(&signature.witnesses, xpubs, backend, network).await?;
    Ok(SignedTransactionStructured::new(tx, &witnesses).to_signed_tx()?)
}
