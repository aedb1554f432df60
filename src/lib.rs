pub mod capture;
pub mod collectors;
pub mod config;
pub mod server;
pub mod state;
