pub mod api;
pub mod config;
pub mod echonet;
pub mod http;
pub mod monitor;
pub mod types;
