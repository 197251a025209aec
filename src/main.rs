//! herakles-limit-notifier - version 0.1.0
//!
//! Observes system resource limits and sends debounced notifications.
//! This is the main entry point that wires the observer to the host metrics,
//! the notification target and the HTTP control API, and handles subcommands.

mod builtin_limits;
mod cli;
mod collectors;
mod commands;
mod config;
mod handlers;
mod metrics;
mod report;
mod state;
mod system;

use axum::{
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use herakles_limit_notifier::{
    DispatchError, Dispatcher, LogDispatcher, Monitor, NotifyBadCounterManager, Observer,
    RunStatistics, WebhookDispatcher,
};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, warn, Level};

use builtin_limits::make_observable_limits;
use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_info, command_send};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    check_handler, health_handler, info_handler, metrics_handler, reset_handler,
    reset_stats_handler, restart_handler, root_handler, start_handler, status_handler,
    stop_handler,
};
use metrics::NotifierMetrics;
use report::{greeting_message, info_message, local_machine_name};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Webhook dispatcher if a URL is configured, log-only otherwise.
fn build_dispatcher(config: &Config) -> Result<Arc<dyn Dispatcher>, DispatchError> {
    match config.webhook_url.as_deref() {
        Some(url) => {
            info!("Notifications go to the configured webhook");
            Ok(Arc::new(WebhookDispatcher::new(
                url,
                config.webhook_username.clone(),
                Duration::from_secs(config.dispatch_timeout_seconds()),
            )?))
        }
        None => {
            warn!("No webhook_url configured - notifications are only logged");
            Ok(Arc::new(LogDispatcher))
        }
    }
}

/// Builds the observer over the built-in limits of this host.
fn build_observer(
    config: &Config,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<Observer, Box<dyn std::error::Error>> {
    let limits = make_observable_limits(&config.limits);
    for limit in &limits {
        debug!(
            "Observing {} ({}): healthy while {} {}",
            limit.key, limit.display_name, limit.comparison, limit.threshold
        );
    }
    info!("Observing {} limits", limits.len());

    let counters = NotifyBadCounterManager::new(
        config.default_badness_threshold(),
        config.default_badness_increment(),
    );
    let monitor = Monitor::new(limits, counters)?;

    Ok(Observer::new(
        monitor,
        dispatcher,
        Arc::new(RunStatistics::new()),
        Duration::from_secs(config.interval_seconds()),
    ))
}

/// Sends the startup greeting together with the system information.
async fn send_greeting(dispatcher: &dyn Dispatcher, hostname: &str) {
    let info = match tokio::task::spawn_blocking(info_message).await {
        Ok(info) => info,
        Err(e) => {
            warn!("Failed to collect system information for greeting: {}", e);
            String::new()
        }
    };
    let message = format!("{}\n{}", greeting_message(hostname), info);

    if let Err(e) = dispatcher.dispatch(&message).await {
        warn!("Failed to send startup greeting: {}", e);
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, &args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Config generation does not need a valid existing config
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        setup_logging(&args);
        let config = load_validated_config(&args)?;

        return match command {
            Commands::Check { strict } => command_check(*strict, &config),
            Commands::Info => command_info(),
            Commands::Send {
                message,
                code_type,
                file,
            } => command_send(message, code_type.as_deref(), file.as_deref(), &config).await,
            Commands::SendFile { file, message } => {
                command_send(message, None, Some(file.as_path()), &config).await
            }
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting herakles-limit-notifier");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let hostname = local_machine_name();

    let dispatcher = build_dispatcher(&config)?;
    let observer = build_observer(&config, dispatcher.clone())?;

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = NotifierMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    if config.greeting.unwrap_or(true) {
        send_greeting(dispatcher.as_ref(), &hostname).await;
    }

    if config.autostart.unwrap_or(true) {
        observer.start()?;
    } else {
        info!("Autostart disabled - start the observer via POST /observer/start");
    }

    let state: SharedState = Arc::new(AppState {
        registry,
        metrics,
        observer: observer.clone(),
        config: Arc::new(config.clone()),
        hostname,
        start_time: Instant::now(),
    });
    debug!(
        "Control API state ready (interval: {}s)",
        state.config.interval_seconds()
    );

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/observer/status", get(status_handler))
        .route("/observer/start", post(start_handler))
        .route("/observer/stop", post(stop_handler))
        .route("/observer/restart", post(restart_handler))
        .route("/observer/reset", post(reset_handler))
        .route("/observer/reset-stats", post(reset_stats_handler))
        .route("/observer/check", post(check_handler))
        .with_state(state);

    // Check if TLS is enabled
    let enable_tls = config.enable_tls.unwrap_or(false);

    if enable_tls {
        // Both paths exist, validate_effective_config() ran above
        let (cert_path, key_path) = match (&config.tls_cert_path, &config.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => return Err("TLS is enabled but certificate paths are missing".into()),
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "herakles-limit-notifier listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    observer.stop();
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "herakles-limit-notifier listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    observer.stop();
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    observer.stop();
    info!("herakles-limit-notifier stopped gracefully");
    Ok(())
}
