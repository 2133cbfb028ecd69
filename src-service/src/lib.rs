//! Skusho capture service.
//!
//! Screen capture through a floating overlay control: a system-granted
//! mirroring session feeds a small frame ring, a tap on the overlay runs a
//! burst of shots, and the shots are written to shared media storage in
//! the background. An unlock window gates capture and ends the session
//! when it runs out.

pub mod burst;
pub mod capture;
pub mod config;
pub mod error;
pub mod ipc;
pub mod notify;
pub mod overlay;
pub mod persist;
pub mod state;
pub mod unlock;

pub use error::ServiceError;
pub use state::{CaptureReport, CaptureService, CaptureTicket, ServiceDeps, ServiceEvent};
