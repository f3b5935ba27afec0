//! Near-object ranging service.
//!
//! Discovers UWB devices, opens a ranging session on each simulator it finds
//! using the stored near-object profile, and logs the measurements until it
//! is interrupted or the configured duration elapses.

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};
use uwb_discovery::UwbDeviceManagerCallbacks;

mod config;
mod context;
mod logging;
mod ranging;
mod simulator;

use config::ServiceConfig;
use context::AppContext;
use logging::NearObjectLogFormatter;
use ranging::{DeviceLogger, RangingService};

/// Crates whose events pass the filter at the configured level
const LOG_TARGETS: &[&str] = &[
    "nearobject",
    "uwb_session",
    "uwb_discovery",
    "uwb_storage",
    "uwb_fira",
    "uwb_tlv",
];

/// Near-object UWB ranging service
#[derive(Parser, Debug)]
#[command(name = "nearobject", version, about = "UWB near-object ranging service")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "nearobject.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Number of simulated devices to attach
    #[arg(long)]
    simulators: Option<u32>,

    /// Discovery poll interval, e.g. 2s
    #[arg(long)]
    poll_interval: Option<humantime::Duration>,

    /// Profile store path
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// How long to range, e.g. 30s; 0s ranges until Ctrl-C
    #[arg(long)]
    duration: Option<humantime::Duration>,

    /// UWB channel (5, 6, 8, 9, 10, 12, 13 or 14)
    #[arg(long)]
    channel: Option<u8>,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(simulators) = self.simulators {
            config.discovery.simulators = simulators;
        }
        if let Some(interval) = self.poll_interval {
            config.discovery.poll_interval = interval.into();
        }
        if let Some(path) = &self.profiles {
            config.profile_path = Some(path.clone());
        }
        if let Some(duration) = self.duration {
            config.ranging.duration = duration.into();
        }
        if let Some(channel) = self.channel {
            config.ranging.channel = channel;
        }
    }
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::new("warn");
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }
    Ok(filter)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The config file may set the level, so start from the CLI or default
    // and swap the filter once the file has been read
    let (filter, filter_handle) =
        reload::Layer::new(env_filter(args.log_level.as_deref().unwrap_or("info"))?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().event_format(NearObjectLogFormatter::new("nearobject")))
        .init();

    info!("Starting nearobject service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServiceConfig::load_from_file(&args.config)?;
    args.apply(&mut config);
    if args.log_level.is_none() {
        filter_handle.reload(env_filter(&config.log_level)?)?;
    }
    debug!("Effective configuration:\n{}", serde_yaml::to_string(&config)?);

    run(config).await
}

async fn run(config: ServiceConfig) -> Result<()> {
    let round_interval = config.ranging.interval.max(Duration::from_millis(1));
    let duration = config.ranging.duration;

    let context = AppContext::build(config).await?;
    let device_logger: Arc<dyn UwbDeviceManagerCallbacks> = Arc::new(DeviceLogger::default());
    context.devices.register_callbacks(&device_logger);

    let profile = context.active_profile().await?;
    info!("Using {} profile", profile.scope);

    context.devices.scan_all().await;
    context.devices.start_discovery()?;

    let service = RangingService::start(&context, &profile)?;
    component_info!("ranging", "Ranging on {} device(s)", service.session_count());

    let shutdown = shutdown_signal(duration);
    tokio::pin!(shutdown);
    let mut rounds = tokio::time::interval(round_interval);
    loop {
        tokio::select! {
            _ = rounds.tick() => service.emit_rounds(),
            reason = &mut shutdown => {
                info!("Shutting down: {}", reason);
                break;
            }
        }
    }

    service.stop().await;
    context.devices.stop_discovery();

    let uptime = context.uptime().to_std().unwrap_or_default();
    info!(
        "nearobject stopped after {}",
        humantime::format_duration(Duration::from_secs(uptime.as_secs()))
    );
    Ok(())
}

/// Resolves on Ctrl-C, or once `duration` has elapsed when it is non-zero
async fn shutdown_signal(duration: Duration) -> &'static str {
    let deadline = async {
        if duration.is_zero() {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(duration).await
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => "interrupted",
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                "signal handler failed"
            }
        },
        _ = deadline => "ranging duration elapsed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "nearobject",
            "--simulators",
            "3",
            "--duration",
            "0s",
            "--channel",
            "5",
        ]);
        let mut config = ServiceConfig::default();
        args.apply(&mut config);
        assert_eq!(config.discovery.simulators, 3);
        assert!(config.ranging.duration.is_zero());
        assert_eq!(config.ranging.channel, 5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_filter_accepts_levels() {
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("trace").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_after_duration() {
        let reason = shutdown_signal(Duration::from_secs(5)).await;
        assert_eq!(reason, "ranging duration elapsed");
    }
}
