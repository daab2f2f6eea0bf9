//! Client code for the Pict'Oh offline agent.
//!
//! This crate provides the HTTP fetcher, the cache strategies, the agent
//! lifecycle and request pipeline, and the warm-up coordinator shared by the
//! stdio host and the CLI.

pub mod agent;
pub mod fetch;
pub mod strategy;
pub mod warmup;

pub use agent::{Agent, CacheReport, ControlMessage, ControlOutcome, LifecycleState};
pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use strategy::{Served, Source};
pub use warmup::{DownloadPhase, ProgressTracker, WarmUpCommand, WarmUpEvent, WarmUpHandle, WarmUpState};
