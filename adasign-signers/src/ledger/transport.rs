use super::types::{LedgerRequest, LedgerResponse};
use crate::{CryptoProviderError, TransportError};
use async_trait::async_trait;
use std::{fmt, time::Duration};
use tracing::{debug, warn};

/// Channels a Ledger can be reached over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerChannel {
    WebUsb,
    /// Legacy channel, used when WebUSB is unsupported or fails to open
    U2f,
}

impl fmt::Display for LedgerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerChannel::WebUsb => f.write_str("WebUSB"),
            LedgerChannel::U2f => f.write_str("U2F"),
        }
    }
}

/// An open channel to the Cardano app
#[async_trait]
pub trait LedgerTransport: fmt::Debug + Send + Sync {
    async fn exchange(&self, request: &LedgerRequest) -> Result<LedgerResponse, TransportError>;

    /// Upper bound for a single exchange, confirmations on the device included
    fn set_exchange_timeout(&mut self, timeout: Duration);
}

/// Opens channels to a Ledger
#[async_trait]
pub trait LedgerConnector: fmt::Debug + Send + Sync {
    async fn is_web_usb_supported(&self) -> bool;

    async fn open(&self, channel: LedgerChannel)
        -> Result<Box<dyn LedgerTransport>, TransportError>;
}

/// Opens a transport, preferring WebUSB when the host supports it.
///
/// If the preferred channel fails to open, U2F is tried once. With `force_web_usb` only WebUSB
/// is tried. When nothing opens, the error of the first attempt is returned.
pub async fn open_transport(
    connector: &dyn LedgerConnector,
    force_web_usb: bool,
) -> Result<Box<dyn LedgerTransport>, CryptoProviderError> {
    if force_web_usb {
        return connector
            .open(LedgerChannel::WebUsb)
            .await
            .map_err(CryptoProviderError::TransportUnavailable)
    }

    let preferred = if connector.is_web_usb_supported().await {
        LedgerChannel::WebUsb
    } else {
        LedgerChannel::U2f
    };
    debug!(channel = %preferred, "opening ledger transport");

    match connector.open(preferred).await {
        Ok(transport) => Ok(transport),
        Err(first) => {
            warn!(channel = %preferred, error = %first, "ledger transport failed, trying U2F");
            connector.open(LedgerChannel::U2f).await.map_err(|fallback| {
                debug!(error = %fallback, "U2F fallback failed");
                CryptoProviderError::TransportUnavailable(first)
            })
        }
    }
}
