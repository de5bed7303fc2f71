//! Audio effects: parameters, preset catalog, routing pipelines and the
//! supervisor that keeps exactly one route alive.

pub mod manager;
pub mod params;
pub mod pipeline;
pub mod presets;
pub mod supervisor;

pub use manager::{FxManager, FxStatus};
pub use params::{FxField, FxParameters, FxValues};
pub use pipeline::{Route, RouteKind};
pub use presets::{FxPreset, PresetCatalog, PresetCategory};
pub use supervisor::{AudioSupervisor, SupervisorState, SupervisorStatus};
