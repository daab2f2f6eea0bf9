//! Core types and shared functionality for the Pict'Oh offline agent.
//!
//! This crate provides:
//! - Cache store with SQLite backend (named, versioned containers)
//! - Request classification rules and per-category cache policies
//! - FIFO eviction and age-based expiration
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod policy;

pub use cache::{CacheDb, CacheNames, CachedEntry};
pub use classify::{Category, classify};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, Response};
pub use policy::{Policy, PolicyTable, Strategy};
