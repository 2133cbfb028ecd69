//! IPC server with secure socket setup.

use super::handlers::handle_request;
use crate::state::CaptureService;
use skusho_common::ipc::{get_socket_path, read_json, write_json, IpcError, Request, Response};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
#[cfg(unix)]
use std::path::Path;

/// Socket file permissions (owner read/write only)
#[cfg(unix)]
const SOCKET_MODE: u32 = 0o600;

/// Socket directory permissions (owner read/write/execute only)
#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o700;

/// Create socket directory with secure permissions.
#[cfg(unix)]
fn create_secure_socket_dir(socket_path: &Path) -> std::io::Result<()> {
    let socket_dir = socket_path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "socket path has no parent directory",
        )
    })?;

    std::fs::create_dir_all(socket_dir)?;
    std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(DIRECTORY_MODE))?;

    // Remove stale socket if exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

/// Set socket file permissions after binding.
#[cfg(unix)]
fn secure_socket_file(socket_path: &Path) -> std::io::Result<()> {
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    let actual = std::fs::metadata(socket_path)?.permissions().mode() & 0o777;
    if actual != SOCKET_MODE {
        warn!("Socket mode is {:o}, expected {:o}", actual, SOCKET_MODE);
    }

    Ok(())
}

/// Serve requests from one client until it disconnects.
pub async fn handle_client<S>(service: Arc<CaptureService>, mut stream: S, client: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Client connected: {}", client);

    loop {
        let request: Request = match read_json(&mut stream).await {
            Ok(req) => req,
            Err(IpcError::ConnectionClosed) => {
                info!("Client disconnected: {}", client);
                break;
            }
            Err(e) => {
                error!("Error reading request from {}: {}", client, e);
                break;
            }
        };

        let response = match request.validate() {
            Ok(()) => handle_request(&service, request).await,
            Err(e) => {
                warn!("Invalid request from {}: {}", client, e);
                Response::error(format!("Invalid request: {}", e))
            }
        };

        if let Err(e) = write_json(&mut stream, &response).await {
            error!("Error writing response to {}: {}", client, e);
            break;
        }
    }
}

/// Run the IPC server until `shutdown` flips to true.
#[cfg(unix)]
pub async fn run_server(
    service: Arc<CaptureService>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::net::UnixListener;

    let socket_path = get_socket_path();
    info!("Starting IPC server at {:?}", socket_path);

    create_secure_socket_dir(&socket_path)?;
    let listener = UnixListener::bind(&socket_path)?;
    // Permissions can only be set once the file exists
    secure_socket_file(&socket_path)?;

    info!("IPC server listening on {:?}", socket_path);

    let mut next_client: u64 = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let accepted = tokio::select! {
            result = listener.accept() => result,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        match accepted {
            Ok((stream, _)) => {
                next_client += 1;
                let client = format!("client-{}", next_client);
                tokio::spawn(handle_client(Arc::clone(&service), stream, client));
            }
            Err(e) => error!("Accept error: {}", e),
        }
    }

    info!("Shutdown requested, stopping IPC server");
    Ok(())
}

/// Run the IPC server (unsupported platforms).
#[cfg(not(unix))]
pub async fn run_server(
    _service: Arc<CaptureService>,
    _shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let socket_path = get_socket_path();
    error!("IPC server at {:?} needs Unix domain sockets", socket_path);
    Err("IPC server is only supported on Unix platforms".into())
}
