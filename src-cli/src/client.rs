//! IPC client for communicating with skusho-service.

use crate::exit_codes::ExitCode;
use skusho_common::ipc::{get_socket_path, read_json, write_json, Request, Response};
use std::path::PathBuf;
use std::time::Duration;
#[cfg(unix)]
use tokio::sync::Mutex;

/// Error type for service client operations.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Connection to service failed
    ConnectionFailed(String),
    /// Failed to send request
    SendFailed(String),
    /// Failed to receive response
    ReceiveFailed(String),
    /// Service returned an error
    RemoteError(String),
    /// Service did not come up in time
    Timeout,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ClientError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            ClientError::ReceiveFailed(msg) => write!(f, "Receive failed: {}", msg),
            ClientError::RemoteError(msg) => write!(f, "Service error: {}", msg),
            ClientError::Timeout => write!(f, "Timed out waiting for the service"),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// Convert to an appropriate exit code.
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            ClientError::ConnectionFailed(_)
            | ClientError::SendFailed(_)
            | ClientError::ReceiveFailed(_)
            | ClientError::Timeout => ExitCode::ServiceConnectionFailed,
            ClientError::RemoteError(msg) => {
                let msg = msg.to_lowercase();
                if msg.contains("locked") {
                    ExitCode::CaptureLocked
                } else if msg.contains("not running") {
                    ExitCode::NotRunning
                } else if msg.contains("consent") || msg.contains("already running") {
                    ExitCode::SessionFailedToStart
                } else if msg.contains("invalid request") {
                    ExitCode::InvalidArguments
                } else {
                    ExitCode::GeneralError
                }
            }
        }
    }
}

#[cfg(unix)]
type Stream = tokio::net::UnixStream;

/// Client for communicating with the capture service.
pub struct ServiceClient {
    #[cfg(unix)]
    connection: Mutex<Option<Stream>>,
    socket_path: PathBuf,
}

impl ServiceClient {
    /// Create a new service client.
    pub fn new() -> Self {
        Self {
            #[cfg(unix)]
            connection: Mutex::new(None),
            socket_path: get_socket_path(),
        }
    }

    /// Connect to the service.
    #[cfg(unix)]
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut conn = self.connection.lock().await;
        if conn.is_some() {
            return Ok(());
        }

        let stream = Stream::connect(&self.socket_path).await.map_err(|e| {
            ClientError::ConnectionFailed(format!(
                "Failed to connect to {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        *conn = Some(stream);
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn connect(&self) -> Result<(), ClientError> {
        Err(ClientError::ConnectionFailed(
            "the service is only reachable over Unix domain sockets".to_string(),
        ))
    }

    /// Send a request to the service and wait for a response.
    ///
    /// A `Response::Error` from the service is returned as
    /// [`ClientError::RemoteError`].
    #[cfg(unix)]
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        self.connect().await?;

        let mut conn = self.connection.lock().await;
        let stream = conn
            .as_mut()
            .ok_or_else(|| ClientError::ConnectionFailed("not connected".to_string()))?;

        write_json(stream, &request)
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;

        let response: Response = tokio::time::timeout(Duration::from_secs(30), read_json(stream))
            .await
            .map_err(|_| ClientError::ReceiveFailed("response timed out".to_string()))?
            .map_err(|e| ClientError::ReceiveFailed(e.to_string()))?;

        if let Response::Error { message } = response {
            return Err(ClientError::RemoteError(message));
        }
        Ok(response)
    }

    #[cfg(not(unix))]
    pub async fn request(&self, _request: Request) -> Result<Response, ClientError> {
        Err(self.connect().await.err().unwrap_or_else(|| {
            ClientError::ConnectionFailed("unsupported platform".to_string())
        }))
    }

    /// Wait for the service socket to accept connections.
    pub async fn wait_for_service(&self, timeout: Duration) -> Result<(), ClientError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(100);

        while start.elapsed() < timeout {
            if self.socket_path.exists() && self.connect().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(ClientError::Timeout)
    }

    /// Connect to the service, spawning it if necessary.
    pub async fn connect_or_spawn(&self) -> Result<(), ClientError> {
        if self.connect().await.is_ok() {
            return Ok(());
        }

        let service_path = find_service_binary().map_err(|e| {
            ClientError::ConnectionFailed(format!("Cannot find service binary: {}", e))
        })?;

        std::process::Command::new(&service_path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ClientError::ConnectionFailed(format!("Failed to spawn service: {}", e)))?;

        self.wait_for_service(Duration::from_secs(10)).await
    }
}

impl Default for ServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the service binary path.
fn find_service_binary() -> Result<PathBuf, String> {
    #[cfg(windows)]
    const SERVICE_BINARY: &str = "skusho-service.exe";
    #[cfg(not(windows))]
    const SERVICE_BINARY: &str = "skusho-service";

    // 1. Sibling binary (development or bundled)
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            let path = dir.join(SERVICE_BINARY);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 2. In PATH
    if let Ok(path) = which::which(SERVICE_BINARY) {
        return Ok(path);
    }

    // 3. Common installation paths
    for path in ["/usr/bin/skusho-service", "/usr/local/bin/skusho-service"] {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(format!("{} binary not found", SERVICE_BINARY))
}
