pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
