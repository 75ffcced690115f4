pub mod config;
pub mod constants;
pub mod geo;
pub mod surface;

pub use surface::{MapSurface, PersistedField};
