//! Skusho Background Service
//!
//! Owns the capture session and overlay, and serves clients over IPC.

use skusho_common::logging::{ensure_log_dir, SERVICE_LOG_PREFIX};
use skusho_service::capture::{platform_facility, probe_display_bounds};
use skusho_service::config::{ConfigFeatureFlags, JsonSettingsStore, ServiceConfig};
use skusho_service::notify::LogNotifier;
use skusho_service::overlay::HeadlessWindowHost;
use skusho_service::persist::DirectoryMediaStore;
use skusho_service::unlock::SystemClock;
use skusho_service::{ipc, CaptureService, ServiceDeps};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log to stderr and to a daily file in the platform log directory.
///
/// The returned guard flushes the file writer on drop.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match ensure_log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, SERVICE_LOG_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            info!("Logging to {:?}", dir);
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            warn!("File logging disabled: {}", e);
            None
        }
    }
}

fn build_service() -> CaptureService {
    let config = ServiceConfig::default();

    let settings = Arc::new(JsonSettingsStore::load_default());
    let flags = Arc::new(ConfigFeatureFlags::new(settings.flags()));

    let bounds = probe_display_bounds().unwrap_or_else(|| {
        info!("No display bounds from platform, using fallback");
        config.fallback_bounds
    });
    let control_px = bounds.dp_to_px(config.control_size_dp).round() as u32;
    info!(
        "Display {}x{} at {} dpi",
        bounds.width, bounds.height, bounds.density_dpi
    );

    let media_store = DirectoryMediaStore::user_default().unwrap_or_else(|| {
        warn!("Could not determine home directory, saving under the temp directory");
        DirectoryMediaStore::new(std::env::temp_dir())
    });
    info!("Saving screenshots under {:?}", media_store.root());

    let deps = ServiceDeps {
        facility: Arc::from(platform_facility()),
        window_host: Arc::new(HeadlessWindowHost::new(bounds, (control_px, control_px))),
        media_store: Arc::new(media_store),
        settings,
        flags,
        clock: Arc::new(SystemClock),
        notifier: Arc::new(LogNotifier),
    };

    CaptureService::new(deps, config)
}

/// Flip `shutdown` on SIGTERM, SIGINT or SIGHUP.
#[cfg(unix)]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint, mut sighup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            _ => {
                error!("Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sighup.recv() => info!("Received SIGHUP"),
        }

        info!("Shutdown requested");
        let _ = shutdown.send(true);
    });
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            let _ = shutdown.send(true);
        }
    });
}

fn main() {
    let _log_guard = init_logging();

    info!("Skusho Service starting (pid: {})...", std::process::id());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        setup_signal_handlers(shutdown_tx);

        let service = Arc::new(build_service());

        let result = ipc::run_server(Arc::clone(&service), shutdown_rx).await;
        service.shutdown().await;

        match result {
            Ok(()) => 0,
            Err(e) => {
                error!("IPC server error: {}", e);
                1
            }
        }
    });

    cleanup_on_shutdown();
    info!("Skusho Service stopped");

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Remove the socket file.
fn cleanup_on_shutdown() {
    #[cfg(unix)]
    {
        let socket_path = skusho_common::ipc::get_socket_path();
        if socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&socket_path) {
                warn!("Failed to remove socket file: {}", e);
            } else {
                info!("Removed socket file: {:?}", socket_path);
            }
        }
    }
}
