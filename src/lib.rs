pub mod actions;
pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sheet;
pub mod stats;
