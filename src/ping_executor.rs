use std::future::Future;
use std::net::IpAddr;
use std::sync::mpsc;
use std::thread;
use std::time::SystemTime;

use log::{debug, error, info};
use socket2::Type;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::Instant;

use crate::error::{JitterError, Result};
use crate::ping::{PingResult, ProbeRequest, ProbeStatistics};

const PAYLOAD: [u8; 56] = [0; 56];

/// Per-reply notification hook.
pub type RecvHook = Box<dyn FnMut(&PingResult) + Send>;

/// Sends a batch of echo requests and reports the captured round-trip times.
#[cfg_attr(test, mockall::automock)]
pub trait Prober: Send {
    /// Runs one batch. Never fails: lost or timed out probes just shorten `rtts`.
    fn probe(&mut self, request: &ProbeRequest) -> ProbeStatistics;

    /// Drops any per-reply hooks so only the finished batch is reported.
    fn clear_hooks(&mut self) {}
}

/// True when `hostname` is a plain DNS name: dot-separated labels of
/// alphanumerics and hyphens, no port, path or zone suffix.
fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty()
        && hostname.len() <= 253
        && hostname.trim_end_matches('.').split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Resolve the target exactly as written; anything else is rejected.
async fn resolve_target(target: &str) -> Option<IpAddr> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Some(ip);
    }

    if !is_valid_hostname(target) {
        debug!("Refusing to resolve malformed host {target:?}");
        return None;
    }

    match tokio::net::lookup_host((target, 0)).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(e) => {
            debug!("Lookup of {target} failed: {e}");
            None
        }
    }
}

/// ICMP sequence number for the `index`-th request of a batch. Wraps past
/// `u16::MAX` like any long-running ping.
fn icmp_sequence(index: usize) -> u16 {
    (index % (usize::from(u16::MAX) + 1)) as u16
}

/// Drives `task` to completion on a fresh worker thread with its own runtime,
/// so callers may already be inside a tokio runtime.
fn on_worker<F, Fut, T>(task: F) -> Result<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T>,
    T: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(|rt| rt.block_on(task()));
        let _ = sender.send(result);
    });

    receiver
        .recv()
        .map_err(|_| JitterError::WorkerLost)?
        .map_err(JitterError::Runtime)
}

/// ICMP prober backed by surge-ping. Each resolution and batch runs on its own
/// worker thread.
pub struct SurgeProber {
    host: String,
    addr: IpAddr,
    identifier: u16,
    on_recv: Option<RecvHook>,
}

impl SurgeProber {
    /// Resolves `host` once; every later batch targets the same address.
    pub fn new(host: &str) -> Result<Self> {
        let target = host.to_string();
        let addr = on_worker(move || async move { resolve_target(&target).await })?
            .ok_or_else(|| JitterError::InvalidHost(host.to_string()))?;
        info!("Resolved {host} to {addr}");

        Ok(Self {
            host: host.to_string(),
            addr,
            identifier: std::process::id() as u16,
            on_recv: None,
        })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn set_on_recv<F>(&mut self, hook: F)
    where
        F: FnMut(&PingResult) + Send + 'static,
    {
        self.on_recv = Some(Box::new(hook));
    }

    fn client_config(&self, privileged: bool) -> Config {
        let kind = match self.addr {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        };
        let sock_type = if privileged { Type::RAW } else { Type::DGRAM };
        Config::builder().kind(kind).sock_type_hint(sock_type).build()
    }

    /// Execute the batch, appending every outcome to `stats`
    async fn execute_batch(
        addr: IpAddr,
        identifier: u16,
        config: Config,
        request: ProbeRequest,
        on_recv: &mut Option<RecvHook>,
        stats: &mut ProbeStatistics,
    ) {
        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to open ICMP socket for {addr}: {e}");
                return;
            }
        };

        let mut pinger = client.pinger(addr, PingIdentifier(identifier)).await;
        let deadline = Instant::now() + request.timeout;

        for index in 0..request.count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Batch timeout reached after {index} requests");
                break;
            }
            pinger.timeout(remaining);

            let sequence = icmp_sequence(index);
            let timestamp = SystemTime::now();
            let result = match pinger.ping(PingSequence(sequence), &PAYLOAD).await {
                Ok((_, rtt)) => PingResult::success(timestamp, sequence, rtt),
                Err(e) => {
                    debug!("icmp_seq={sequence} to {addr} failed: {e}");
                    PingResult::failure(timestamp, sequence)
                }
            };
            stats.record(&result);

            if result.success {
                if let Some(hook) = on_recv.as_mut() {
                    hook(&result);
                }
            }

            if index + 1 < request.count {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::time::sleep(request.interval.min(remaining)).await;
            }
        }
    }
}

impl Prober for SurgeProber {
    fn probe(&mut self, request: &ProbeRequest) -> ProbeStatistics {
        let addr = self.addr;
        let identifier = self.identifier;
        let config = self.client_config(request.privileged);
        let request = *request;
        let mut stats = ProbeStatistics::new(&self.host, Some(addr));
        let mut on_recv = self.on_recv.take();

        let outcome = on_worker(move || async move {
            Self::execute_batch(addr, identifier, config, request, &mut on_recv, &mut stats)
                .await;
            (stats, on_recv)
        });

        match outcome {
            Ok((stats, on_recv)) => {
                self.on_recv = on_recv;
                stats
            }
            Err(e) => {
                error!("Probe batch against {addr} aborted: {e}");
                ProbeStatistics::new(&self.host, Some(addr))
            }
        }
    }

    fn clear_hooks(&mut self) {
        self.on_recv = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::{Arc, Mutex};

    #[test]
    fn hostname_validation() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("example.com."));
        assert!(is_valid_hostname("my-host.example.com"));
        assert!(is_valid_hostname("localhost"));

        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("example.com:8080"));
        assert!(!is_valid_hostname("exa mple.com"));
        assert!(!is_valid_hostname("my_host.example.com"));
        assert!(!is_valid_hostname("10.0.0.1/24"));
        assert!(!is_valid_hostname("fe80::1%eth0"));
        assert!(!is_valid_hostname("-bad.example.com"));
        assert!(!is_valid_hostname("a..b"));
    }

    #[test]
    fn ip_literals_resolve_without_lookup() {
        let prober = SurgeProber::new("192.0.2.1").unwrap();
        assert_eq!(prober.addr(), IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));

        let prober = SurgeProber::new("::1").unwrap();
        assert_eq!(prober.addr(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn malformed_hosts_are_rejected_not_rewritten() {
        for host in ["10.0.0.1/24", "127.0.0.1_5", "my_host.example.com", "fe80::1%eth0", "%%%", ""] {
            match SurgeProber::new(host) {
                Err(JitterError::InvalidHost(rejected)) => assert_eq!(rejected, host),
                other => panic!("expected InvalidHost for {host:?}, got {:?}", other.map(|p| p.addr())),
            }
        }
    }

    #[test]
    fn sequence_numbers_wrap_at_u16() {
        assert_eq!(icmp_sequence(0), 0);
        assert_eq!(icmp_sequence(65_535), u16::MAX);
        assert_eq!(icmp_sequence(65_536), 0);
        assert_eq!(icmp_sequence(65_538), 2);
    }

    #[test]
    fn clear_hooks_removes_recv_hook() {
        let mut prober = SurgeProber::new("127.0.0.1").unwrap();
        prober.set_on_recv(|_| {});
        assert!(prober.on_recv.is_some());

        prober.clear_hooks();
        assert!(prober.on_recv.is_none());
    }

    #[test]
    fn recv_hook_survives_a_batch() {
        let mut prober = SurgeProber::new("127.0.0.1").unwrap();
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        prober.set_on_recv(move |_| *counter.lock().unwrap() += 1);

        let request = ProbeRequest {
            count: 0,
            privileged: false,
            timeout: std::time::Duration::from_millis(100),
            interval: std::time::Duration::ZERO,
        };
        prober.probe(&request);

        assert!(prober.on_recv.is_some());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn zero_count_sends_nothing() {
        let mut prober = SurgeProber::new("127.0.0.1").unwrap();
        let request = ProbeRequest {
            count: 0,
            privileged: false,
            timeout: std::time::Duration::from_millis(100),
            interval: std::time::Duration::ZERO,
        };

        let stats = prober.probe(&request);
        assert_eq!(stats.packets_sent, 0);
        assert!(stats.rtts.is_empty());
        assert_eq!(stats.addr, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn usable_from_inside_a_runtime() {
        let mut prober = SurgeProber::new("127.0.0.1").unwrap();
        let request = ProbeRequest {
            count: 1,
            privileged: false,
            timeout: std::time::Duration::from_millis(200),
            interval: std::time::Duration::ZERO,
        };

        let stats = prober.probe(&request);
        assert!(stats.rtts.len() <= 1);
        assert_eq!(stats.host, "127.0.0.1");
    }
}
