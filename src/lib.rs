// src/lib.rs
pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod predictors;
pub mod types;
pub mod utils;
