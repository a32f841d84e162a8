//! Create-measure use case
//!
//! One reading per customer, meter type and calendar month. The month
//! check runs before the vision call so a duplicate never costs an API
//! request; the database UNIQUE constraint catches the concurrent case
//! the check cannot see.

use chrono::{DateTime, Utc};
use meterscan_common::{Measure, MeasureMonth, MeasureType, NewMeasure};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::MeasureRepository;
use crate::error::{ApiError, ApiResult};
use crate::services::{VisionClient, VisionReading};

#[derive(Debug, Clone)]
pub struct CreateMeasureRequest {
    pub image: String,
    pub customer_code: String,
    pub measure_datetime: DateTime<Utc>,
    pub measure_type: MeasureType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMeasureResponse {
    pub image_url: String,
    pub measure_value: f64,
    pub measure_uuid: String,
}

pub async fn create_measure(
    repository: &MeasureRepository,
    vision: &dyn VisionClient,
    request: CreateMeasureRequest,
) -> ApiResult<CreateMeasureResponse> {
    let month = MeasureMonth::of(&request.measure_datetime);

    let existing = repository
        .find_by_customer_and_type(&request.customer_code, request.measure_type)
        .await?;

    if existing.iter().any(|m| m.month() == month) {
        warn!(
            customer_code = %request.customer_code,
            measure_type = %request.measure_type,
            month = %month,
            "Rejected second reading for month"
        );
        return Err(ApiError::double_report());
    }

    let reading = vision
        .analyze(&request.image, request.measure_type)
        .await
        .map_err(|e| {
            error!(error = %e, customer_code = %request.customer_code, "Vision analysis failed");
            ApiError::Internal("Error processing image".to_string())
        })?;

    let measure = match persist(repository, request, &reading).await {
        Ok(measure) => measure,
        Err(e) => {
            if let Err(cleanup) = vision.discard(&reading.measure_uuid).await {
                warn!(
                    error = %cleanup,
                    measure_uuid = %reading.measure_uuid,
                    "Failed to discard image of unsaved measure"
                );
            }
            return Err(e);
        }
    };

    info!(
        measure_uuid = %measure.measure_uuid(),
        customer_code = %measure.customer_code(),
        measure_type = %measure.measure_type(),
        measure_value = reading.measure_value,
        "Measure created"
    );

    Ok(CreateMeasureResponse {
        image_url: reading.image_url,
        measure_value: reading.measure_value,
        measure_uuid: reading.measure_uuid,
    })
}

async fn persist(
    repository: &MeasureRepository,
    request: CreateMeasureRequest,
    reading: &VisionReading,
) -> ApiResult<Measure> {
    let measure = Measure::new(NewMeasure {
        id: None,
        measure_uuid: Some(reading.measure_uuid.clone()),
        customer_code: request.customer_code,
        measure_datetime: request.measure_datetime,
        measure_type: request.measure_type,
        image_url: reading.image_url.clone(),
        measure_value: Some(reading.measure_value),
        has_confirmed: false,
    })
    .map_err(|e| {
        error!(error = %e, "Vision result rejected by measure validation");
        ApiError::unexpected()
    })?;

    repository.create(&measure).await?;
    Ok(measure)
}
