//! Business rules for measures
//!
//! Each use case takes the repository (and vision client) by reference and
//! returns an [`ApiResult`](crate::ApiResult), so HTTP handlers and tests
//! run the same code path.

pub mod confirm_measure;
pub mod create_measure;
pub mod list_measures;

pub use confirm_measure::{confirm_measure, ConfirmMeasureRequest, ConfirmMeasureResponse};
pub use create_measure::{create_measure, CreateMeasureRequest, CreateMeasureResponse};
pub use list_measures::{list_measures, ListMeasuresResponse, MeasureSummary};
