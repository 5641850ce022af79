// src/core/mod.rs
pub mod decision;
pub mod engine;
pub mod lifecycle;
pub mod notifier;
