//! Scriptable test doubles for targets and strategies.
//!
//! Responses are queued per capability and handed out in order. A call with
//! nothing queued fails with [`WaitError::Target`], and
//! [`MockTarget::assert_expectations`] panics if a queued response was never
//! consumed.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use crate::context::WaitContext;
use crate::error::{WaitError, WaitResult};
use crate::strategy::Strategy;
use crate::target::{ContainerState, ExecOutput, LogStream, Port, PortMap, StrategyTarget};

/// In-memory [`StrategyTarget`] with scripted responses.
#[derive(Default)]
pub struct MockTarget {
    state: Mutex<MockTargetState>,
}

#[derive(Default)]
struct MockTargetState {
    host: VecDeque<WaitResult<String>>,
    mapped_port: VecDeque<WaitResult<Port>>,
    logs: VecDeque<WaitResult<Option<LogStream>>>,
    exec: VecDeque<WaitResult<ExecOutput>>,
    ports: VecDeque<WaitResult<PortMap>>,
    state: VecDeque<WaitResult<ContainerState>>,
    calls: Vec<&'static str>,
    exec_commands: Vec<Vec<String>>,
    mapped_ports: Vec<Port>,
}

impl MockTargetState {
    fn pending(&self) -> Vec<(&'static str, usize)> {
        [
            ("host", self.host.len()),
            ("mapped_port", self.mapped_port.len()),
            ("logs", self.logs.len()),
            ("exec", self.exec.len()),
            ("ports", self.ports.len()),
            ("state", self.state.len()),
        ]
        .into_iter()
        .filter(|(_, left)| *left > 0)
        .collect()
    }
}

fn next<T>(queue: &mut VecDeque<WaitResult<T>>, capability: &str) -> WaitResult<T> {
    queue
        .pop_front()
        .unwrap_or_else(|| Err(WaitError::Target(format!("unexpected call to {capability}"))))
}

impl MockTarget {
    /// A target with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_host(mut self, result: WaitResult<String>) -> Self {
        self.state_mut().host.push_back(result);
        self
    }

    pub fn on_mapped_port(mut self, result: WaitResult<Port>) -> Self {
        self.state_mut().mapped_port.push_back(result);
        self
    }

    pub fn on_logs(mut self, result: WaitResult<Option<LogStream>>) -> Self {
        self.state_mut().logs.push_back(result);
        self
    }

    pub fn on_exec(mut self, result: WaitResult<ExecOutput>) -> Self {
        self.state_mut().exec.push_back(result);
        self
    }

    pub fn on_ports(mut self, result: WaitResult<PortMap>) -> Self {
        self.state_mut().ports.push_back(result);
        self
    }

    pub fn on_state(mut self, result: WaitResult<ContainerState>) -> Self {
        self.state_mut().state.push_back(result);
        self
    }

    /// Number of calls made to one capability.
    pub fn calls(&self, capability: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|name| **name == capability)
            .count()
    }

    /// Number of calls made to any capability.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Commands passed to `exec`, in call order.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.lock().exec_commands.clone()
    }

    /// Ports passed to `mapped_port`, in call order.
    pub fn mapped_ports(&self) -> Vec<Port> {
        self.lock().mapped_ports.clone()
    }

    /// Panic if any scripted response was never consumed.
    #[track_caller]
    pub fn assert_expectations(&self) {
        let pending = self.lock().pending();
        assert!(
            pending.is_empty(),
            "mock target has unconsumed responses: {pending:?}"
        );
    }

    fn state_mut(&mut self) -> &mut MockTargetState {
        self.state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, MockTargetState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, capability: &'static str) -> MutexGuard<'_, MockTargetState> {
        let mut state = self.lock();
        state.calls.push(capability);
        state
    }
}

#[async_trait]
impl StrategyTarget for MockTarget {
    async fn host(&self, _ctx: &WaitContext) -> WaitResult<String> {
        next(&mut self.record("host").host, "host")
    }

    async fn mapped_port(&self, _ctx: &WaitContext, port: &Port) -> WaitResult<Port> {
        let mut state = self.record("mapped_port");
        state.mapped_ports.push(*port);
        next(&mut state.mapped_port, "mapped_port")
    }

    async fn logs(&self, _ctx: &WaitContext) -> WaitResult<Option<LogStream>> {
        next(&mut self.record("logs").logs, "logs")
    }

    async fn exec(&self, _ctx: &WaitContext, cmd: &[String]) -> WaitResult<ExecOutput> {
        let mut state = self.record("exec");
        state.exec_commands.push(cmd.to_vec());
        next(&mut state.exec, "exec")
    }

    async fn ports(&self, _ctx: &WaitContext) -> WaitResult<PortMap> {
        next(&mut self.record("ports").ports, "ports")
    }

    async fn state(&self, _ctx: &WaitContext) -> WaitResult<ContainerState> {
        next(&mut self.record("state").state, "state")
    }
}

/// In-memory [`Strategy`] with scripted results.
#[derive(Debug, Default)]
pub struct MockStrategy {
    state: Mutex<MockStrategyState>,
}

#[derive(Debug, Default)]
struct MockStrategyState {
    results: VecDeque<WaitResult<()>>,
    calls: usize,
}

impl MockStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next wait.
    pub fn returning(self, result: WaitResult<()>) -> Self {
        self.lock().results.push_back(result);
        self
    }

    /// Number of waits performed.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Panic if any scripted result was never consumed.
    #[track_caller]
    pub fn assert_expectations(&self) {
        let left = self.lock().results.len();
        assert_eq!(left, 0, "mock strategy has {left} unconsumed results");
    }

    fn lock(&self) -> MutexGuard<'_, MockStrategyState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    async fn wait_until_ready(
        &self,
        _ctx: &WaitContext,
        _target: &dyn StrategyTarget,
    ) -> WaitResult<()> {
        let mut state = self.lock();
        state.calls += 1;
        next(&mut state.results, "wait_until_ready")
    }
}

/// Log stream whose every read fails with `message`.
pub fn failing_reader(message: impl Into<String>) -> LogStream {
    Box::new(FailingReader(message.into()))
}

struct FailingReader(String);

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::other(self.0.clone())))
    }
}
