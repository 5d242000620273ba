//! Upload form server: login, a CSV upload page, and the commands that run
//! them

pub mod commands;
pub mod config;
pub mod config_template;
pub mod error;
pub mod routes;
pub mod server;
pub mod views;

pub use config::{SluiceConfig, load_config};
pub use server::{AppState, build_router, serve_with_shutdown, start_server};
