//! Confirm-measure use case

use meterscan_common::Error;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{MeasureRepository, StoreError};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct ConfirmMeasureRequest {
    pub measure_uuid: String,
    pub confirmed_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmMeasureResponse {
    pub success: bool,
}

/// Record the human-confirmed value of a reading. A reading can be
/// confirmed once.
pub async fn confirm_measure(
    repository: &MeasureRepository,
    request: ConfirmMeasureRequest,
) -> ApiResult<ConfirmMeasureResponse> {
    let mut measure = repository
        .find_by_measure_uuid(&request.measure_uuid)
        .await?
        .ok_or_else(|| ApiError::MeasureNotFound("Measure not found".to_string()))?;

    measure.confirm(request.confirmed_value).map_err(|e| match e {
        Error::AlreadyConfirmed(_) => already_confirmed(&request.measure_uuid),
        other => ApiError::InvalidData(other.to_string()),
    })?;

    // A concurrent confirm may have landed since the read above
    repository
        .confirm(measure.measure_uuid(), request.confirmed_value)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyConfirmed(_) => already_confirmed(&request.measure_uuid),
            StoreError::NotFound(_) => ApiError::MeasureNotFound("Measure not found".to_string()),
            other => other.into(),
        })?;

    info!(
        measure_uuid = %request.measure_uuid,
        confirmed_value = request.confirmed_value,
        "Measure confirmed"
    );

    Ok(ConfirmMeasureResponse { success: true })
}

fn already_confirmed(measure_uuid: &str) -> ApiError {
    warn!(measure_uuid = %measure_uuid, "Measure already confirmed");
    ApiError::ConfirmationDuplicate("Measure already confirmed".to_string())
}
