// Pages Admin - page tree administration core

// Core types and pure helpers
pub mod core;

// Page domain models and tree editor submissions
pub mod models;

// Infrastructure - storage, caching, events, lookups
pub mod infrastructure;

// Page services - CRUD, reorder, duplicate
pub mod services;

// HTTP interface
pub mod pages_interface;

// Common utilities
pub mod error;
pub mod config;
pub mod app_state;

// Re-exports for convenience
pub use error::{AppError, AppResult};
