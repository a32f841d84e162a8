//! # meterscan common library
//!
//! Shared code for the meterscan service:
//! - Measure entity and meter types
//! - Calendar-month helpers
//! - Configuration resolution
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Measure, MeasureType, NewMeasure};
pub use time::MeasureMonth;
