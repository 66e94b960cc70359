//! Configuration types consumed by the primitives, re-exported from `coord-config`.

pub use coord_config::shared::*;
