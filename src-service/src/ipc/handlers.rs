//! IPC request handlers.
//!
//! Each request maps onto one [`CaptureService`] operation.

use crate::capture::ConsentToken;
use crate::state::CaptureService;
use skusho_common::ipc::{Request, Response};
use skusho_common::StopReason;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handle an IPC request and return a response.
pub async fn handle_request(service: &Arc<CaptureService>, request: Request) -> Response {
    debug!("Handling request: {:?}", request);

    match request {
        // === Session Control ===
        Request::StartSession { consent } => {
            info!("StartSession");
            match service.start(ConsentToken::new(consent)).await {
                Ok(()) => Response::SessionStarted,
                Err(e) => {
                    error!("Failed to start session: {}", e);
                    Response::error(e.to_string())
                }
            }
        }
        Request::StopSession => {
            info!("StopSession");
            let was_running = service.stop(StopReason::User).await;
            Response::SessionStopped { was_running }
        }

        // === Capture ===
        Request::Capture => match service.capture().await {
            // The burst finishes on its own task; clients poll status.
            Ok(_ticket) => Response::CaptureQueued,
            Err(e) => {
                warn!("Capture request failed: {}", e);
                Response::error(e.to_string())
            }
        },
        Request::OverlayTouch { action, x, y } => {
            match service.handle_touch(action, x, y).await {
                Ok(outcome) => Response::TouchHandled { outcome },
                Err(e) => Response::error(e.to_string()),
            }
        }

        // === State ===
        Request::GetStatus => Response::Status(service.status().await),
        Request::GrantUnlock => {
            let expiry_ms = service.grant_unlock();
            Response::UnlockGranted { expiry_ms }
        }
    }
}
