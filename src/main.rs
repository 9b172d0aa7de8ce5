use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, warn};
use ping_jitter::{JitterConfig, JitterStatistics, Jitterer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host name or IP address to probe
    host: String,

    /// Echo requests per batch
    #[arg(short = 'c', long)]
    count: Option<usize>,

    /// Use raw ICMP sockets (needs elevated privileges)
    #[arg(long, overrides_with = "no_privileged")]
    privileged: bool,

    /// Use unprivileged datagram ICMP sockets, overriding the saved config
    #[arg(long, overrides_with = "privileged")]
    no_privileged: bool,

    /// Upper bound on the whole batch, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Pause between requests, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Persist the effective settings as the new defaults
    #[arg(long)]
    save_config: bool,
}

/// Command-line flags layered over the saved config.
fn effective_config(args: &Args, mut config: JitterConfig) -> JitterConfig {
    if let Some(count) = args.count {
        config.sample_size = count;
    }
    if args.privileged {
        config.privileged = true;
    } else if args.no_privileged {
        config.privileged = false;
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.interval_ms {
        config.interval = Duration::from_millis(ms);
    }
    config
}

fn print_summary(stats: &JitterStatistics) {
    println!("{}", stats.host());
    println!("uncorrected sd: {:.3}ms", stats.uncorrected_sd_ms());
    println!("corrected sd:   {:.3}ms", stats.corrected_sd_ms());
    println!("range:          {:.3}ms", stats.rtt_range_ms());
    println!("rtts:           {:?}", stats.rtts_ms());
    println!("loss:           {:.1}%", stats.packet_loss());
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let config = effective_config(&args, JitterConfig::load());
    if args.save_config {
        if let Err(e) = config.save() {
            warn!("Failed to save config: {e}");
        }
    }

    let mut jitterer = match Jitterer::new(&args.host) {
        Ok(jitterer) => jitterer,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    jitterer.set_sample_size(config.sample_size);
    jitterer.set_privileged(config.privileged);
    jitterer.set_timeout(config.timeout);
    jitterer.set_interval(config.interval);

    let stats = jitterer.run();

    if args.json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&stats);
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    fn saved_privileged() -> JitterConfig {
        JitterConfig {
            privileged: true,
            ..JitterConfig::default()
        }
    }

    #[test]
    fn no_privileged_overrides_saved_config() {
        let args = parse(&["ping-jitter", "example.com", "--no-privileged"]);
        assert!(!effective_config(&args, saved_privileged()).privileged);
    }

    #[test]
    fn saved_privileged_kept_without_flags() {
        let args = parse(&["ping-jitter", "example.com"]);
        assert!(effective_config(&args, saved_privileged()).privileged);
    }

    #[test]
    fn last_privilege_flag_wins() {
        let args = parse(&["ping-jitter", "example.com", "--no-privileged", "--privileged"]);
        assert!(effective_config(&args, JitterConfig::default()).privileged);

        let args = parse(&["ping-jitter", "example.com", "--privileged", "--no-privileged"]);
        assert!(!effective_config(&args, saved_privileged()).privileged);
    }

    #[test]
    fn numeric_flags_override_config() {
        let args = parse(&[
            "ping-jitter",
            "example.com",
            "-c",
            "5",
            "--timeout-ms",
            "10000",
            "--interval-ms",
            "50",
        ]);
        let config = effective_config(&args, JitterConfig::default());

        assert_eq!(config.sample_size, 5);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.interval, Duration::from_millis(50));
    }
}
