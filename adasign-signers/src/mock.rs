//! Mock device transports used in test environments.
use crate::{
    ledger::{LedgerChannel, LedgerConnector, LedgerRequest, LedgerResponse, LedgerTransport},
    trezor::{TrezorRequest, TrezorResponse, TrezorTransport},
    TransportError, TrezorManifest,
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::{Arc, Mutex},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors for the mock transports
pub enum MockError {
    /// Empty requests queue
    #[error("empty requests queue, the device was never called")]
    EmptyRequests,

    /// Empty responses queue
    #[error("empty responses queue, please push some responses")]
    EmptyResponses,
}

/// Requests seen and responses queued on a mock device
#[derive(Debug)]
struct Exchanges<Req, Resp> {
    requests: VecDeque<Req>,
    responses: VecDeque<Result<Resp, TransportError>>,
    calls: usize,
}

impl<Req, Resp> Default for Exchanges<Req, Resp> {
    fn default() -> Self {
        Self { requests: VecDeque::new(), responses: VecDeque::new(), calls: 0 }
    }
}

impl<Req: Debug + PartialEq, Resp> Exchanges<Req, Resp> {
    /// Records `request` and pops the oldest queued response
    fn exchange(&mut self, request: Req) -> Result<Resp, TransportError> {
        self.calls += 1;
        self.requests.push_back(request);
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other(MockError::EmptyResponses.to_string())))
    }

    fn assert_request(&mut self, expected: &Req) -> Result<(), MockError> {
        let request = self.requests.pop_front().ok_or(MockError::EmptyRequests)?;
        assert_eq!(&request, expected);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
/// Mock Ledger transport. Clones share their queues, so a test can keep a handle on a transport
/// that was moved into a provider.
pub struct MockLedgerTransport {
    state: Arc<Mutex<Exchanges<LedgerRequest, LedgerResponse>>>,
    exchange_timeout: Arc<Mutex<Option<Duration>>>,
}

impl MockLedgerTransport {
    /// Instantiates a mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response
    pub fn push(&self, response: LedgerResponse) {
        self.state.lock().unwrap().responses.push_back(Ok(response));
    }

    /// Queues a version response
    pub fn push_version(&self, major: u64, minor: u64, patch: u64) {
        self.push(LedgerResponse::Version(crate::ledger::LedgerVersion { major, minor, patch }));
    }

    /// Queues a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.state.lock().unwrap().responses.push_back(Err(error));
    }

    /// Checks that the oldest unchecked request equals `expected`
    pub fn assert_request(&self, expected: &LedgerRequest) -> Result<(), MockError> {
        self.state.lock().unwrap().assert_request(expected)
    }

    /// Unchecked requests, oldest first
    pub fn requests(&self) -> Vec<LedgerRequest> {
        self.state.lock().unwrap().requests.iter().cloned().collect()
    }

    /// Number of exchanges so far
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn exchange_timeout(&self) -> Option<Duration> {
        *self.exchange_timeout.lock().unwrap()
    }
}

#[async_trait]
impl LedgerTransport for MockLedgerTransport {
    async fn exchange(&self, request: &LedgerRequest) -> Result<LedgerResponse, TransportError> {
        self.state.lock().unwrap().exchange(request.clone())
    }

    fn set_exchange_timeout(&mut self, timeout: Duration) {
        *self.exchange_timeout.lock().unwrap() = Some(timeout);
    }
}

#[derive(Clone, Debug)]
/// Mock connector handing out a [`MockLedgerTransport`]
pub struct MockLedgerConnector {
    transport: MockLedgerTransport,
    web_usb_supported: bool,
    failing: Vec<LedgerChannel>,
    attempts: Arc<Mutex<Vec<LedgerChannel>>>,
}

impl MockLedgerConnector {
    pub fn new(transport: MockLedgerTransport) -> Self {
        Self {
            transport,
            web_usb_supported: true,
            failing: vec![],
            attempts: Arc::new(Mutex::new(vec![])),
        }
    }

    #[must_use]
    pub fn web_usb_supported(mut self, supported: bool) -> Self {
        self.web_usb_supported = supported;
        self
    }

    /// Makes opening `channel` fail
    #[must_use]
    pub fn fail_channel(mut self, channel: LedgerChannel) -> Self {
        self.failing.push(channel);
        self
    }

    /// Channels open was called with, in order
    pub fn attempts(&self) -> Vec<LedgerChannel> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerConnector for MockLedgerConnector {
    async fn is_web_usb_supported(&self) -> bool {
        self.web_usb_supported
    }

    async fn open(
        &self,
        channel: LedgerChannel,
    ) -> Result<Box<dyn LedgerTransport>, TransportError> {
        self.attempts.lock().unwrap().push(channel);
        if self.failing.contains(&channel) {
            return Err(TransportError::ChannelUnavailable(format!("{channel} device not found")))
        }
        Ok(Box::new(self.transport.clone()))
    }
}

#[derive(Clone, Debug, Default)]
/// Mock Trezor bridge. Clones share their queues.
pub struct MockTrezorTransport {
    state: Arc<Mutex<Exchanges<TrezorRequest, TrezorResponse>>>,
    manifest: Arc<Mutex<Option<TrezorManifest>>>,
}

impl MockTrezorTransport {
    /// Instantiates a mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response
    pub fn push(&self, response: TrezorResponse) {
        self.state.lock().unwrap().responses.push_back(Ok(response));
    }

    /// Queues a firmware version answer
    pub fn push_features(&self, major: u64, minor: u64, patch: u64) {
        self.push(TrezorResponse::features(major, minor, patch));
    }

    /// Queues a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.state.lock().unwrap().responses.push_back(Err(error));
    }

    /// Checks that the oldest unchecked request equals `expected`
    pub fn assert_request(&self, expected: &TrezorRequest) -> Result<(), MockError> {
        self.state.lock().unwrap().assert_request(expected)
    }

    /// Unchecked requests, oldest first
    pub fn requests(&self) -> Vec<TrezorRequest> {
        self.state.lock().unwrap().requests.iter().cloned().collect()
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    /// The manifest registered by the provider
    pub fn registered_manifest(&self) -> Option<TrezorManifest> {
        self.manifest.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrezorTransport for MockTrezorTransport {
    fn manifest(&mut self, manifest: &TrezorManifest) {
        *self.manifest.lock().unwrap() = Some(manifest.clone());
    }

    async fn call(&self, request: &TrezorRequest) -> Result<TrezorResponse, TransportError> {
        self.state.lock().unwrap().exchange(request.clone())
    }
}
