//! Database access for meterscan-api

pub mod measures;

pub use measures::{MeasureRepository, MeasureUpdate, StoreError};
