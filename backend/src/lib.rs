pub mod auth;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;
