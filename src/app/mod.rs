// Application layer: HTTP surface around the fan-out core.

pub mod server;

pub use server::{router, serve, AppState};
