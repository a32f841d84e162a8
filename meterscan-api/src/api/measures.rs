//! Measure endpoints
//!
//! - `POST /upload`: submit a meter photo
//! - `PATCH /confirm`: confirm or correct a reading
//! - `GET /:customer_code/list`: reading history
//!
//! Handlers validate the request shape, run the use case and let
//! [`ApiError`] render failures. Extractor rejections (malformed JSON,
//! wrong field types) are reported as `INVALID_DATA`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, patch, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use meterscan_common::time::parse_measure_datetime;
use meterscan_common::MeasureType;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::usecases::{
    self, ConfirmMeasureRequest, ConfirmMeasureResponse, CreateMeasureRequest,
    CreateMeasureResponse, ListMeasuresResponse,
};
use crate::AppState;

/// POST /upload body
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub customer_code: String,
    #[serde(default)]
    pub measure_datetime: String,
    #[serde(default)]
    pub measure_type: String,
}

/// PATCH /confirm body
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub measure_uuid: String,
    pub confirmed_value: Option<f64>,
}

/// GET /:customer_code/list query
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub measure_type: Option<String>,
}

impl UploadRequest {
    /// Check every field, reporting all failures at once
    pub fn validate(self) -> ApiResult<CreateMeasureRequest> {
        let mut errors = Vec::new();

        if self.image.is_empty() || STANDARD.decode(&self.image).is_err() {
            errors.push("Invalid base64 format");
        }
        if self.customer_code.trim().is_empty() {
            errors.push("Customer code is required");
        }
        let measure_datetime = parse_measure_datetime(&self.measure_datetime);
        if measure_datetime.is_none() {
            errors.push("Invalid date format");
        }
        let measure_type = self.measure_type.parse::<MeasureType>().ok();
        if measure_type.is_none() {
            errors.push("Measure type must be 'WATER' or 'GAS'");
        }

        match (measure_datetime, measure_type) {
            (Some(measure_datetime), Some(measure_type)) if errors.is_empty() => {
                Ok(CreateMeasureRequest {
                    image: self.image,
                    customer_code: self.customer_code,
                    measure_datetime,
                    measure_type,
                })
            }
            _ => Err(ApiError::InvalidData(errors.join(", "))),
        }
    }
}

impl ConfirmRequest {
    pub fn validate(self) -> ApiResult<ConfirmMeasureRequest> {
        let mut errors = Vec::new();

        if self.measure_uuid.trim().is_empty() {
            errors.push("Measure UUID is required");
        }
        let confirmed_value = self.confirmed_value.filter(|v| v.is_finite() && *v >= 0.0);
        if confirmed_value.is_none() {
            errors.push("Confirmed value must be a positive number");
        }

        match confirmed_value {
            Some(confirmed_value) if errors.is_empty() => Ok(ConfirmMeasureRequest {
                measure_uuid: self.measure_uuid,
                confirmed_value,
            }),
            _ => Err(ApiError::InvalidData(errors.join(", "))),
        }
    }
}

/// POST /upload
pub async fn upload_measure(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<Json<CreateMeasureResponse>> {
    let Json(body) = payload.map_err(|e| ApiError::InvalidData(e.body_text()))?;
    let request = body.validate()?;

    let response =
        usecases::create_measure(&state.measures, state.vision.as_ref(), request).await?;
    Ok(Json(response))
}

/// PATCH /confirm
pub async fn confirm_measure(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<Json<ConfirmMeasureResponse>> {
    let Json(body) = payload.map_err(|e| ApiError::InvalidData(e.body_text()))?;
    let request = body.validate()?;

    let response = usecases::confirm_measure(&state.measures, request).await?;
    Ok(Json(response))
}

/// GET /:customer_code/list
pub async fn list_measures(
    State(state): State<AppState>,
    Path(customer_code): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListMeasuresResponse>> {
    let Query(query) = query.map_err(|e| ApiError::InvalidData(e.body_text()))?;
    if customer_code.trim().is_empty() {
        return Err(ApiError::InvalidData("Customer code is required".to_string()));
    }

    let response = usecases::list_measures(
        &state.measures,
        &customer_code,
        query.measure_type.as_deref(),
    )
    .await?;
    Ok(Json(response))
}

/// Build measure routes
pub fn measure_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_measure))
        .route("/confirm", patch(confirm_measure))
        .route("/:customer_code/list", get(list_measures))
}
