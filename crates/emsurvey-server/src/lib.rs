pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod dictionary_seed;
pub mod logging;
pub mod product_seed;
pub mod region_seed;
pub mod state;
