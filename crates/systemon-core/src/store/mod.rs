// ── Device storage ──

mod cache;

pub use cache::{FleetCache, FleetSnapshot, MergeStats};
