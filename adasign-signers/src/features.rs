//! Feature gating by backend firmware version
use crate::CryptoProviderError;
use semver::Version;

/// Capabilities that depend on the backend firmware
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum CryptoProviderFeature {
    /// Baseline every session needs
    Minimal,
    /// Exporting several extended public keys in one call
    BulkExport,
    /// Stake pool registration certificates
    PoolRegistration,
    /// Native token bundles in outputs
    MultiAsset,
    /// Showing legacy Byron addresses on the device
    ByronAddressDisplay,
}

/// Minimum Cardano app versions of the Ledger
pub const LEDGER_VERSIONS: &[(CryptoProviderFeature, &str)] = &[
    (CryptoProviderFeature::Minimal, "2.0.2"),
    (CryptoProviderFeature::BulkExport, "2.1.0"),
    (CryptoProviderFeature::PoolRegistration, "2.1.0"),
    (CryptoProviderFeature::MultiAsset, "2.2.0"),
    (CryptoProviderFeature::ByronAddressDisplay, "2.0.4"),
];

/// Minimum Trezor firmware versions. Public keys are always exported in bundles.
pub const TREZOR_VERSIONS: &[(CryptoProviderFeature, &str)] = &[
    (CryptoProviderFeature::Minimal, "2.3.2"),
    (CryptoProviderFeature::PoolRegistration, "2.3.5"),
    (CryptoProviderFeature::MultiAsset, "2.3.6"),
];

/// Maps the version a backend reported at construction to the features it supports.
///
/// Versions compare as `(major, minor, patch)` triples; features absent from the requirement
/// table are always supported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureGate {
    version: Version,
    requirements: Vec<(CryptoProviderFeature, Version)>,
}

impl FeatureGate {
    pub fn new(
        version: Version,
        requirements: &[(CryptoProviderFeature, &str)],
    ) -> Result<Self, semver::Error> {
        let requirements = requirements
            .iter()
            .map(|(feature, required)| Ok((*feature, Version::parse(required)?)))
            .collect::<Result<_, semver::Error>>()?;
        Ok(Self { version, requirements })
    }

    /// A gate without requirements, for software backends
    pub fn unrestricted() -> Self {
        Self { version: Version::new(0, 0, 0), requirements: vec![] }
    }

    /// The backend version captured at construction
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn required_version(&self, feature: CryptoProviderFeature) -> Option<&Version> {
        self.requirements.iter().find(|(f, _)| *f == feature).map(|(_, version)| version)
    }

    pub fn is_supported(&self, feature: CryptoProviderFeature) -> bool {
        match self.required_version(feature) {
            Some(required) => triple(&self.version) >= triple(required),
            None => true,
        }
    }

    pub fn ensure_supported(
        &self,
        feature: CryptoProviderFeature,
    ) -> Result<(), CryptoProviderError> {
        match self.required_version(feature) {
            Some(required) if triple(&self.version) < triple(required) => {
                Err(CryptoProviderError::FeatureUnsupported {
                    feature,
                    required: required.clone(),
                    actual: self.version.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn triple(version: &Version) -> (u64, u64, u64) {
    (version.major, version.minor, version.patch)
}
