pub mod access;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;
pub mod utils;

pub use handlers::{configure, AppState};
