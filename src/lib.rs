pub mod api;
pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod server;
pub mod services;
pub mod store;
pub mod tasks;
pub mod utils;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;
