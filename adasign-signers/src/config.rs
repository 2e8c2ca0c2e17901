use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default device exchange timeout, the wallet's inactivity logout period
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(900);

/// Application identity handed to the Trezor bridge
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorManifest {
    pub email: String,
    pub app_url: String,
}

/// Provider configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CryptoProviderConfig {
    /// How long a single device exchange may take, in seconds on the wire
    #[serde(with = "duration_secs")]
    pub exchange_timeout: Duration,
    /// Export several account keys per backend call when the backend supports it
    pub should_export_pub_key_bulk: bool,
    /// Only try WebUSB when connecting to a Ledger
    pub force_web_usb: bool,
    pub trezor_manifest: TrezorManifest,
}

impl Default for CryptoProviderConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            should_export_pub_key_bulk: true,
            force_web_usb: false,
            trezor_manifest: TrezorManifest::default(),
        }
    }
}

impl CryptoProviderConfig {
    #[must_use]
    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    #[must_use]
    pub fn should_export_pub_key_bulk(mut self, bulk: bool) -> Self {
        self.should_export_pub_key_bulk = bulk;
        self
    }

    #[must_use]
    pub fn force_web_usb(mut self, force: bool) -> Self {
        self.force_web_usb = force;
        self
    }

    #[must_use]
    pub fn trezor_manifest(mut self, email: impl Into<String>, app_url: impl Into<String>) -> Self {
        self.trezor_manifest = TrezorManifest { email: email.into(), app_url: app_url.into() };
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
