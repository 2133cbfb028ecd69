//! IPC surface of the capture service.

pub mod handlers;
pub mod server;

pub use handlers::handle_request;
pub use server::run_server;
