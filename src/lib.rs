pub mod config;
pub mod dispatch;
pub mod lead;
pub mod output;
pub mod response;
pub mod server;
pub mod summary;
pub mod telemetry;
