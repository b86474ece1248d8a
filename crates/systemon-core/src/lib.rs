//! Fleet polling and caching engine for Shure SystemOn gateways.
//!
//! - **[`Aggregator`]**: facade for one gateway. [`start()`](Aggregator::start)
//!   spawns the background poller; [`retrieve_all()`](Aggregator::retrieve_all)
//!   answers from the cache without touching the network and keeps the
//!   poller awake; [`apply_control()`](Aggregator::apply_control) drives a
//!   device with transparent reinitialize-and-retry.
//!
//! - **[`FleetCache`]**: `DashMap` storage with a `watch` snapshot, patched
//!   in place for the online flag and control values.
//!
//! - **Poller** ([`poller`]): pause-aware scheduler alternating discovery
//!   listings and bounded-concurrency detail fetches.
//!
//! - **Mapping** ([`mapping`]): TOML per-model tables turning raw gateway
//!   payloads into [`DeviceRecord`]s.

pub mod aggregator;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod mapping;
pub mod model;
pub mod poller;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregator::Aggregator;
pub use config::{AggregatorConfig, TlsVerification, parse_csv};
pub use control::{ControlCommand, ControlOutcome, ControlRequest};
pub use diagnostics::{Diagnostics, ErrorTracker};
pub use error::CoreError;
pub use mapping::{DeviceMapper, MappingTable};
pub use model::{ControlKind, ControllableProperty, DeviceRecord};
pub use poller::{CycleReport, PollerState};
pub use store::{FleetCache, FleetSnapshot};
