//! Satellite ingest: schema validation, activity log and the TCP listener

pub mod activity;
pub mod event;
pub mod listener;

pub use activity::ActivityLog;
pub use event::{DeviceClass, EventKind, SatelliteEvent};
pub use listener::SatelliteListener;
