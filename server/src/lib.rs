pub mod daemon;

pub use daemon::AppState;
pub use daemon::router;
pub use daemon::run_daemon;
