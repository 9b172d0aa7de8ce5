use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::JitterConfig;
use crate::error::Result;
use crate::ping::{ProbeRequest, ProbeStatistics};
use crate::ping_executor::{Prober, SurgeProber};
use crate::statistics::JitterStatistics;

/// Whether a batch has completed yet. A batch in flight holds the engine
/// exclusively, so there is no observable running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Complete,
}

struct Batch {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    probe: ProbeStatistics,
}

/// Runs probe batches against one host and turns them into jitter statistics.
///
/// `run` borrows the engine mutably and `spawn` consumes it, so two batches can
/// never overlap on the same instance.
pub struct Jitterer<P: Prober = SurgeProber> {
    host: String,
    config: JitterConfig,
    prober: P,
    state: RunState,
    last: Option<Batch>,
}

impl Jitterer<SurgeProber> {
    /// Resolves `host` and prepares an ICMP prober with default settings.
    pub fn new(host: &str) -> Result<Self> {
        let prober = SurgeProber::new(host)?;
        Ok(Self::with_prober(host, prober))
    }
}

impl<P: Prober> Jitterer<P> {
    pub fn with_prober(host: &str, prober: P) -> Self {
        Self::with_config(host, prober, JitterConfig::default())
    }

    pub fn with_config(host: &str, prober: P, config: JitterConfig) -> Self {
        Self {
            host: host.to_string(),
            config,
            prober,
            state: RunState::Idle,
            last: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn set_sample_size(&mut self, size: usize) {
        self.config.sample_size = size;
    }

    /// Raw ICMP sockets when true, unprivileged datagram sockets otherwise.
    pub fn set_privileged(&mut self, value: bool) {
        self.config.privileged = value;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.config.interval = interval;
    }

    /// Runs one probe batch, blocking until the prober returns or times out.
    pub fn run(&mut self) -> JitterStatistics {
        let request = ProbeRequest::from(&self.config);
        debug!("Starting batch against {}: {:?}", self.host, request);

        self.prober.clear_hooks();

        let start = Utc::now();
        let probe = self.prober.probe(&request);
        let end = Utc::now();

        info!(
            "Batch against {} finished: {}/{} replies",
            self.host, probe.packets_recv, probe.packets_sent
        );

        let batch = Batch { start, end, probe };
        let stats = self.snapshot(&batch);
        self.last = Some(batch);
        self.state = RunState::Complete;
        stats
    }

    /// Statistics of the last completed batch, or `None` before the first run.
    pub fn statistics(&self) -> Option<JitterStatistics> {
        self.last.as_ref().map(|batch| self.snapshot(batch))
    }

    fn snapshot(&self, batch: &Batch) -> JitterStatistics {
        JitterStatistics::compute(&self.host, batch.start, batch.end, batch.probe.clone())
    }
}

impl<P: Prober + 'static> Jitterer<P> {
    /// Runs one batch on a worker thread.
    ///
    /// `on_finish` is called exactly once, on that worker thread, after every
    /// probe has been answered or the timeout expired. The engine is handed back
    /// through the join handle for further runs.
    pub fn spawn<F>(mut self, on_finish: F) -> JoinHandle<Self>
    where
        F: FnOnce(JitterStatistics) + Send + 'static,
    {
        thread::spawn(move || {
            let stats = self.run();
            on_finish(stats);
            self
        })
    }
}
