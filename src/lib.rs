// Library surface for headless/integration tests and reuse.
// Terminal setup and the CLI stay in main.rs.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod export;
pub mod format;
pub mod metrics;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod store;
pub mod tick;
pub mod timer;
pub mod ui;
