pub mod config;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

pub use state::AppState;
