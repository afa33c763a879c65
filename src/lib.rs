pub mod config;
pub mod logging;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;
