use super::types::{TrezorRequest, TrezorResponse};
use crate::{TransportError, TrezorManifest};
use async_trait::async_trait;
use std::fmt;

/// A connection to the Trezor bridge
#[async_trait]
pub trait TrezorTransport: fmt::Debug + Send + Sync {
    /// Registers the application identity. Called once before the first call.
    fn manifest(&mut self, manifest: &TrezorManifest);

    async fn call(&self, request: &TrezorRequest) -> Result<TrezorResponse, TransportError>;
}
