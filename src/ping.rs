use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::config::JitterConfig;

/// Outcome of a single echo request.
#[derive(Debug, Clone)]
pub struct PingResult {
    pub timestamp: SystemTime,
    pub sequence: u16,
    pub response_time: Option<Duration>,
    pub success: bool,
}

impl PingResult {
    pub fn success(timestamp: SystemTime, sequence: u16, response_time: Duration) -> Self {
        Self {
            timestamp,
            sequence,
            response_time: Some(response_time),
            success: true,
        }
    }

    pub fn failure(timestamp: SystemTime, sequence: u16) -> Self {
        Self {
            timestamp,
            sequence,
            response_time: None,
            success: false,
        }
    }
}

/// Snapshot of the configuration handed to a prober for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    pub count: usize,
    pub privileged: bool,
    pub timeout: Duration,
    pub interval: Duration,
}

impl From<&JitterConfig> for ProbeRequest {
    fn from(config: &JitterConfig) -> Self {
        Self {
            count: config.sample_size,
            privileged: config.privileged,
            timeout: config.timeout,
            interval: config.interval,
        }
    }
}

/// Raw result of a probe batch as reported by the prober.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeStatistics {
    pub host: String,
    pub addr: Option<IpAddr>,
    pub packets_sent: usize,
    pub packets_recv: usize,
    /// Round-trip times in arrival order.
    pub rtts: Vec<Duration>,
}

impl ProbeStatistics {
    pub fn new(host: impl Into<String>, addr: Option<IpAddr>) -> Self {
        Self {
            host: host.into(),
            addr,
            packets_sent: 0,
            packets_recv: 0,
            rtts: Vec::new(),
        }
    }

    pub fn record(&mut self, result: &PingResult) {
        self.packets_sent += 1;
        if let Some(rtt) = result.response_time {
            self.packets_recv += 1;
            self.rtts.push(rtt);
        }
    }

    /// Percentage of sent requests that got no reply.
    pub fn packet_loss(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        let lost = self.packets_sent.saturating_sub(self.packets_recv);
        lost as f64 / self.packets_sent as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_arrival_order_and_counts_losses() {
        let now = SystemTime::now();
        let mut stats = ProbeStatistics::new("example.com", None);
        stats.record(&PingResult::success(now, 0, Duration::from_millis(30)));
        stats.record(&PingResult::failure(now, 1));
        stats.record(&PingResult::success(now, 2, Duration::from_millis(10)));
        stats.record(&PingResult::failure(now, 3));

        assert_eq!(stats.packets_sent, 4);
        assert_eq!(stats.packets_recv, 2);
        assert_eq!(stats.rtts, vec![Duration::from_millis(30), Duration::from_millis(10)]);
        assert_eq!(stats.packet_loss(), 50.0);
    }

    #[test]
    fn packet_loss_is_zero_when_nothing_was_sent() {
        let stats = ProbeStatistics::new("example.com", None);
        assert_eq!(stats.packet_loss(), 0.0);
    }

    #[test]
    fn request_copies_config() {
        let config = JitterConfig {
            sample_size: 7,
            privileged: true,
            timeout: Duration::from_secs(4),
            interval: Duration::from_millis(20),
        };
        let request = ProbeRequest::from(&config);
        assert_eq!(request.count, 7);
        assert!(request.privileged);
        assert_eq!(request.timeout, Duration::from_secs(4));
        assert_eq!(request.interval, Duration::from_millis(20));
    }
}
