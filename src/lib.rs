//! Climate livability classification.
//!
//! Compares a historical baseline year with a modelled future year for a
//! coordinate, combines the rain, temperature, and wind deviations with a
//! sea-level-rise check, and reports whether the place stays livable.
//! Batch and grid drivers run the classification over city lists and
//! lat/lon grids; results can be exported as GeoJSON maps.

pub mod analysis;
pub mod assess;
pub mod config;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod presets;
pub mod scan;
pub mod verify;
