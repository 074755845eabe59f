pub mod config;
pub mod goals;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod upload;
