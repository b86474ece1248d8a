// ── Domain model ──

pub mod device;

pub use device::{ControlKind, ControllableProperty, DeviceRecord};
