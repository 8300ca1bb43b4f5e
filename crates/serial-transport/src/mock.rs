use crate::{ByteTransport, PortInfo, Result, SerialSettings, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Called with every written buffer; whatever it returns is queued as incoming bytes.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MockState {
    rx: VecDeque<u8>,
    tx: Vec<Vec<u8>>,
    fail_writes: bool,
    closed: bool,
    responder: Option<Responder>,
}

/// A simple in-process mock port. Each instance is independent; use [`MockTransport::handle`]
/// to feed bytes and inspect writes after the transport has been moved into a client.
pub struct MockTransport {
    name: String,
    state: Arc<Mutex<MockState>>,
}

/// Shared view into a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            name: "mock0".to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Mock that answers every write through `responder`.
    pub fn with_responder(responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> Self {
        let mock = Self::new();
        lock(&mock.state).responder = Some(Box::new(responder));
        mock
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Queue bytes for the transport to return from `read_byte`.
    pub fn push_rx(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }

    /// Every buffer written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).tx.clone()
    }

    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut lock(&self.state).tx)
    }

    pub fn pending_rx(&self) -> usize {
        lock(&self.state).rx.len()
    }

    /// Make subsequent writes fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Simulate the device disappearing: every further operation fails.
    pub fn close(&self) {
        lock(&self.state).closed = true;
    }
}

impl ByteTransport for MockTransport {
    fn open(name: &str, _settings: &SerialSettings) -> Result<Self> {
        let mut mock = Self::new();
        mock.name = name.to_string();
        Ok(mock)
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        // An empty queue behaves like a read timeout
        Ok(state.rx.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Io(format!("{}: write failed", self.name)));
        }
        state.tx.push(bytes.to_vec());
        let reply = state.responder.as_mut().map(|respond| respond(bytes));
        if let Some(reply) = reply {
            state.rx.extend(reply);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.rx.clear();
        Ok(())
    }
}
