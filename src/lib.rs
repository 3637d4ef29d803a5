pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod policy;
pub mod review_guard;
