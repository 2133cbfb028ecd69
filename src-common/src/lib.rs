//! Skusho Common Library
//!
//! Shared types and IPC protocol for communication between the Skusho
//! capture service and its clients (CLI, UI shells).

pub mod ipc;
pub mod logging;
pub mod types;

pub use types::*;
