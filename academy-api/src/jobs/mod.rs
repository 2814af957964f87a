//! Background Jobs for the Academy API
//!
//! - `warmup`: recomputes the admin overview caches off the request path
//!
//! # Usage
//!
//! The coordinator is built once at startup and shared through the app
//! state:
//!
//! ```ignore
//! use academy_api::jobs::{OverviewWarmer, WarmupConfig, WarmupCoordinator};
//!
//! let warmer = Arc::new(OverviewWarmer::new(overview.clone()));
//! let coordinator = WarmupCoordinator::new(warmer, store, clock, WarmupConfig::from_env(), 3);
//! coordinator.trigger_startup();
//! ```

pub mod warmup;

pub use warmup::{
    OverviewWarmer, TriggerOutcome, WarmupConfig, WarmupCoordinator, WarmupMetrics,
    WarmupReason, WarmupRequest, WarmupRunner, WarmupSnapshot,
};
