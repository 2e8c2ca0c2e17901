use crate::features::CryptoProviderFeature;
use adasign_core::{
    bip32::KeyError,
    types::{Address, AddressError, CertificateError, PathError, TokenError, TxHash},
};
use semver::Version;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Failure of the channel to a hardware device
pub enum TransportError {
    /// The channel could not be opened
    #[error("transport channel unavailable: {0}")]
    ChannelUnavailable(String),
    /// No answer within the configured exchange timeout
    #[error("device did not answer within {0:?}")]
    Timeout(Duration),
    #[error("device disconnected")]
    Disconnected,
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
/// Error of a crypto provider operation
pub enum CryptoProviderError {
    #[error("unknown crypto provider type: {0}")]
    UnsupportedProviderKind(String),
    /// Neither the preferred nor the fallback channel could be opened. Carries the error of the
    /// first attempt.
    #[error("no compatible transport could be opened: {0}")]
    TransportUnavailable(#[source] TransportError),
    #[error("{feature} requires version {required}, device runs {actual}")]
    FeatureUnsupported { feature: CryptoProviderFeature, required: Version, actual: Version },
    /// A certificate carries a type code outside the known variants
    #[error("invalid certificate type {0}")]
    InvalidCertificateType(u8),
    #[error(transparent)]
    Certificate(CertificateError),
    /// The backend kind does not offer this operation. Raised before any device interaction.
    #[error("operation {0} is not supported by this crypto provider")]
    UnsupportedOperation(&'static str),
    /// The backend reported a failure, including the user declining on the device
    #[error("backend operation failed: {0}")]
    BackendOperationFailed(String),
    /// The backend signed a transaction whose identifier differs from the local one
    #[error("tx serialization mismatch: computed {expected}, backend reported {reported}")]
    TxSerializationMismatch { expected: TxHash, reported: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no derivation path for address {0}")]
    MissingDerivationPath(Address),
    #[error("unexpected response from device: {0}")]
    UnexpectedResponse(String),
    #[error("invalid wallet secret: {0}")]
    InvalidWalletSecret(String),
    #[error("missing crypto provider option: {0}")]
    MissingOption(&'static str),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    SemVer(#[from] semver::Error),
}

impl From<CertificateError> for CryptoProviderError {
    fn from(err: CertificateError) -> Self {
        match err {
            CertificateError::InvalidCertificateType(code) => {
                CryptoProviderError::InvalidCertificateType(code)
            }
            other => CryptoProviderError::Certificate(other),
        }
    }
}

impl CryptoProviderError {
    /// Whether the error must never be retried or downgraded
    pub fn is_fatal(&self) -> bool {
        matches!(self, CryptoProviderError::TxSerializationMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasign_core::types::{
        reward_account_to_bech32, reward_address_bytes, NetworkId, RawCertificate, TxCertificate,
    };

    fn certificate(code: u8) -> RawCertificate {
        let bytes = reward_address_bytes(&[7u8; 28], NetworkId::Mainnet);
        let staking_address = reward_account_to_bech32(&bytes, NetworkId::Mainnet).unwrap();
        serde_json::from_value(serde_json::json!({
            "type": code,
            "stakingAddress": staking_address,
            "poolHash": "abcd",
        }))
        .unwrap()
    }

    #[test]
    fn unknown_certificate_type() {
        let err: CryptoProviderError = TxCertificate::try_from(certificate(7)).unwrap_err().into();
        assert!(matches!(err, CryptoProviderError::InvalidCertificateType(7)));
        assert_eq!(err.to_string(), "invalid certificate type 7");
        assert!(!err.is_fatal());

        assert!(TxCertificate::try_from(certificate(2)).is_ok());
    }

    #[test]
    fn missing_certificate_field() {
        let err: CryptoProviderError = TxCertificate::try_from(certificate(3)).unwrap_err().into();
        assert!(matches!(
            err,
            CryptoProviderError::Certificate(CertificateError::MissingField { .. })
        ));
    }
}
