//! CLI command implementations.

use crate::client::{ClientError, ServiceClient};
use crate::colors;
use crate::exit_codes::ExitCode;
use skusho_common::ipc::{Request, Response};
use skusho_common::{OverlayVisibility, ServiceStatus};
use std::time::{SystemTime, UNIX_EPOCH};

/// Connect to the service, printing the failure unless quiet.
async fn connect(quiet: bool) -> Result<ServiceClient, ExitCode> {
    let client = ServiceClient::new();
    match client.connect_or_spawn().await {
        Ok(()) => Ok(client),
        Err(e) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
            }
            Err(e.to_exit_code())
        }
    }
}

fn report_error(e: &ClientError, json: bool, quiet: bool) -> ExitCode {
    if json {
        println!("{}", serde_json::json!({ "error": e.to_string() }));
    } else if !quiet {
        eprintln!("{}", colors::error(&e.to_string()));
    }
    e.to_exit_code()
}

fn unexpected(other: &Response, quiet: bool) -> ExitCode {
    if !quiet {
        eprintln!("{}", colors::error(&format!("Unexpected response: {:?}", other)));
    }
    ExitCode::GeneralError
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Whole seconds left in the unlock window, or `None` when it is closed.
fn remaining_secs(remaining_ms: u64) -> Option<u64> {
    if remaining_ms == 0 {
        return None;
    }
    Some(remaining_ms.div_ceil(1000))
}

/// Start a capture session using the granted mirroring consent.
pub async fn start(consent: String, json: bool, quiet: bool) -> ExitCode {
    let client = match connect(quiet).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.request(Request::StartSession { consent }).await {
        Ok(Response::SessionStarted) => {
            if json {
                println!("{}", serde_json::json!({ "status": "started" }));
            } else if !quiet {
                println!("{}", colors::success("Capture session started."));
            }
            ExitCode::Success
        }
        Ok(other) => unexpected(&other, quiet),
        Err(e) => report_error(&e, json, quiet),
    }
}

/// Stop the current capture session.
pub async fn stop(json: bool, quiet: bool) -> ExitCode {
    let client = match connect(quiet).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.request(Request::StopSession).await {
        Ok(Response::SessionStopped { was_running }) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "stopped", "was_running": was_running })
                );
            } else if !quiet {
                if was_running {
                    println!("{}", colors::success("Capture session stopped."));
                } else {
                    println!("{}", colors::dim("No capture session running."));
                }
            }
            ExitCode::Success
        }
        Ok(other) => unexpected(&other, quiet),
        Err(e) => report_error(&e, json, quiet),
    }
}

fn print_status(status: &ServiceStatus) {
    println!("{} {}", colors::bold("Session:"), colors::running(status.running));

    let overlay = match status.overlay {
        OverlayVisibility::Removed => "removed",
        OverlayVisibility::Shown => "shown",
        OverlayVisibility::Hidden => "hidden",
    };
    println!("{} {}", colors::bold("Overlay:"), overlay);

    let gated = if status.ad_required {
        colors::yes()
    } else {
        colors::no()
    };
    println!("{} {}", colors::bold("Unlock required:"), gated);

    if status.ad_required {
        match remaining_secs(status.unlock_remaining_ms) {
            Some(secs) => println!("{} {}", colors::bold("Unlocked for:"), colors::remaining(secs)),
            None => println!("{} {}", colors::bold("Unlocked for:"), colors::dim("locked")),
        }
    }
}

/// Show the service state.
pub async fn status(json: bool, quiet: bool) -> ExitCode {
    let client = match connect(quiet).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.request(Request::GetStatus).await {
        Ok(Response::Status(status)) => {
            if json {
                match serde_json::to_string(&status) {
                    Ok(s) => println!("{}", s),
                    Err(e) => {
                        eprintln!("{}", colors::error(&e.to_string()));
                        return ExitCode::GeneralError;
                    }
                }
            } else {
                print_status(&status);
            }
            ExitCode::Success
        }
        Ok(other) => unexpected(&other, quiet),
        Err(e) => report_error(&e, json, quiet),
    }
}

/// Trigger one burst, as if the overlay had been tapped.
pub async fn capture(json: bool, quiet: bool) -> ExitCode {
    let client = match connect(quiet).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.request(Request::Capture).await {
        Ok(Response::CaptureQueued) => {
            if json {
                println!("{}", serde_json::json!({ "status": "queued" }));
            } else if !quiet {
                println!("{}", colors::success("Capture queued."));
            }
            ExitCode::Success
        }
        Ok(other) => unexpected(&other, quiet),
        Err(e) => report_error(&e, json, quiet),
    }
}

/// Record a completed reward and open the unlock window.
pub async fn unlock(json: bool, quiet: bool) -> ExitCode {
    let client = match connect(quiet).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.request(Request::GrantUnlock).await {
        Ok(Response::UnlockGranted { expiry_ms }) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "unlocked", "expiry_ms": expiry_ms })
                );
            } else if !quiet {
                let left = expiry_ms.saturating_sub(now_ms()).max(0) as u64;
                let secs = remaining_secs(left).unwrap_or(0);
                println!(
                    "{} {}",
                    colors::success("Capture unlocked for"),
                    colors::remaining(secs)
                );
            }
            ExitCode::Success
        }
        Ok(other) => unexpected(&other, quiet),
        Err(e) => report_error(&e, json, quiet),
    }
}

/// Show version information.
pub fn version(json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", serde_json::json!({ "version": version }));
    } else {
        println!("{} {}", colors::bold("skusho"), version);
    }
}
