pub mod app;
pub mod http;
pub mod logging;

pub use app::{build_router, spawn_session_sweeper, AppState};
