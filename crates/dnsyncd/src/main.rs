// # dnsyncd - DNS Address Synchronizer Daemon
//
// This is a THIN integration layer:
// - DO NOT add DNS logic or retry logic here
// - All synchronization logic lives in dnsync-core
// - Configuration is via environment variables ONLY
//
// The dnsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the provider, IP source and notifier into the engine
// 4. Running the scheduler until a signal or a rejected credential
//
// ## Configuration
//
// - `CLOUDFLARE_API_KEY`: API token (required)
// - `DNS_URL`: Comma-separated domains (required)
// - `CRON_SCHEDULE`: Cron expression (required)
// - `TIMEZONE`: IANA timezone for the schedule (default Europe/London)
// - `PROXIED`: Proxy flag for every record (default true)
// - `IP_OVERRIDE`: Fixed IPv4 address instead of resolving
// - `WEBHOOK_URL` / `WEBHOOK_METHOD`: Status notifications (GET or POST)
// - `DEBUG`: Log raw provider responses
// - `DDNS_MODE`: `dry-run` to skip provider writes
// - `LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_KEY=your_token
// export DNS_URL=home.example.com,vpn.example.com
// export CRON_SCHEDULE="*/5 * * * *"
//
// dnsyncd
// ```

use anyhow::Result;
use dnsync_core::traits::{IpSource, StaticIpSource};
use dnsync_core::{DdnsConfig, DdnsEngine, Scheduler, StopReason};
use dnsync_ip_http::HttpIpSource;
use dnsync_notify_webhook::WebhookNotifier;
use dnsync_provider_cloudflare::CloudflareProvider;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: Provider rejected the credential, schedule halted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Credential rejected by the provider
    CredentialHalted = 3,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<StopReason> for DdnsExitCode {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Shutdown => DdnsExitCode::CleanShutdown,
            StopReason::Halted => DdnsExitCode::CredentialHalted,
            StopReason::Exhausted => DdnsExitCode::RuntimeError,
        }
    }
}

fn log_level(config: &DdnsConfig) -> Level {
    if config.debug {
        return Level::DEBUG;
    }

    match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = match DdnsConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&config))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting dnsyncd daemon");
    // Debug impl redacts the token
    info!("Configuration loaded: {:?}", config);

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Startup error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(&config, &engine).await {
            Ok(reason) => DdnsExitCode::from(reason),
            Err(e) => {
                error!("Daemon error: {}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    info!("dnsyncd exiting with code {}", code as u8);
    code.into()
}

/// Wire the components described by `config` into an engine
fn build_engine(config: &DdnsConfig) -> Result<DdnsEngine> {
    let provider = CloudflareProvider::from_config(config)?;

    let ip_source: Box<dyn IpSource> = match config.ip_override_addr()? {
        Some(ip) => Box::new(StaticIpSource::new(ip)),
        None => Box::new(HttpIpSource::new()?),
    };
    info!("IP source: {}", ip_source.source_name());

    let mut engine = DdnsEngine::new(Box::new(provider), ip_source, config)?;

    if let Some(webhook) = &config.webhook {
        info!("Webhook notifications: {} {}", webhook.method, webhook.url);
        engine = engine.with_notifier(Box::new(WebhookNotifier::new(webhook)?));
    }

    Ok(engine)
}

/// Run the scheduler until it stops on its own or a signal arrives
async fn run_daemon(config: &DdnsConfig, engine: &DdnsEngine) -> Result<StopReason> {
    let schedule = config.cron_schedule()?;
    info!(
        "Schedule: '{}' ({})",
        schedule.expression(),
        schedule.timezone()
    );

    let shutdown = shutdown_signal()?;
    let reason = Scheduler::new(schedule).run(engine, shutdown).await;

    match reason {
        StopReason::Shutdown => info!("Shutting down daemon"),
        StopReason::Halted => warn!("Schedule halted: provider credential rejected"),
        StopReason::Exhausted => warn!("Schedule has no further ticks"),
    }

    Ok(reason)
}

/// Future resolving on SIGTERM or SIGINT
///
/// Handlers are installed before returning, so setup failures surface here
/// rather than inside the scheduler.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future resolving on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    })
}
