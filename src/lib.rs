pub mod api_types;
pub mod config;
pub mod logging;
pub mod reqlog;
pub mod router;
pub mod state;
