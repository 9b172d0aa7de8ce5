//! Network jitter measurement over batches of ICMP echo probes.

pub mod config;
pub mod error;
pub mod jitter;
pub mod ping;
pub mod ping_executor;
pub mod statistics;

pub use config::JitterConfig;
pub use error::{JitterError, Result};
pub use jitter::{Jitterer, RunState};
pub use ping::{PingResult, ProbeRequest, ProbeStatistics};
pub use ping_executor::{Prober, SurgeProber};
pub use statistics::JitterStatistics;
