//! List-measures use case

use chrono::{DateTime, Utc};
use meterscan_common::{Measure, MeasureType};
use serde::Serialize;
use tracing::debug;

use crate::db::MeasureRepository;
use crate::error::{ApiError, ApiResult};

/// One entry of a customer's reading history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureSummary {
    pub measure_uuid: String,
    pub measure_datetime: DateTime<Utc>,
    pub measure_type: MeasureType,
    pub has_confirmed: bool,
    pub image_url: String,
}

impl From<&Measure> for MeasureSummary {
    fn from(measure: &Measure) -> Self {
        Self {
            measure_uuid: measure.measure_uuid().to_string(),
            measure_datetime: measure.measure_datetime(),
            measure_type: measure.measure_type(),
            has_confirmed: measure.has_confirmed(),
            image_url: measure.image_url().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListMeasuresResponse {
    pub customer_code: String,
    pub measures: Vec<MeasureSummary>,
}

/// List a customer's readings, optionally filtered by meter type
/// (case-insensitive, WATER or GAS).
pub async fn list_measures(
    repository: &MeasureRepository,
    customer_code: &str,
    measure_type: Option<&str>,
) -> ApiResult<ListMeasuresResponse> {
    let filter = measure_type
        .map(|raw| {
            raw.parse::<MeasureType>()
                .map_err(|_| ApiError::InvalidType("Measure type not allowed".to_string()))
        })
        .transpose()?;

    let measures = match filter {
        Some(measure_type) => {
            repository
                .find_by_customer_and_type(customer_code, measure_type)
                .await?
        }
        None => repository.find_by_customer(customer_code).await?,
    };

    if measures.is_empty() {
        return Err(ApiError::MeasuresNotFound("No measures found".to_string()));
    }

    debug!(customer_code = %customer_code, count = measures.len(), "Listing measures");

    Ok(ListMeasuresResponse {
        customer_code: customer_code.to_string(),
        measures: measures.iter().map(MeasureSummary::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::repository;
    use chrono::TimeZone;
    use meterscan_common::NewMeasure;

    async fn seed(repo: &MeasureRepository, measure_type: MeasureType, month: u32) {
        let measure = Measure::new(NewMeasure {
            id: None,
            measure_uuid: None,
            customer_code: "12345".to_string(),
            measure_datetime: Utc.with_ymd_and_hms(2024, month, 10, 8, 0, 0).unwrap(),
            measure_type,
            image_url: "http://localhost:3000/temp/m.jpg".to_string(),
            measure_value: Some(5.0),
            has_confirmed: false,
        })
        .unwrap();
        repo.create(&measure).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_all_types() {
        let repo = repository().await;
        seed(&repo, MeasureType::Water, 7).await;
        seed(&repo, MeasureType::Gas, 8).await;

        let response = list_measures(&repo, "12345", None).await.unwrap();
        assert_eq!(response.customer_code, "12345");
        assert_eq!(response.measures.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filter_is_case_insensitive() {
        let repo = repository().await;
        seed(&repo, MeasureType::Water, 7).await;
        seed(&repo, MeasureType::Gas, 8).await;

        let response = list_measures(&repo, "12345", Some("gas")).await.unwrap();
        assert_eq!(response.measures.len(), 1);
        assert_eq!(response.measures[0].measure_type, MeasureType::Gas);
    }

    #[tokio::test]
    async fn test_list_unknown_type_is_invalid_type() {
        let repo = repository().await;
        seed(&repo, MeasureType::Water, 7).await;

        let err = list_measures(&repo, "12345", Some("ELECTRIC")).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TYPE");
        assert_eq!(err.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_list_empty_is_not_found() {
        let repo = repository().await;
        seed(&repo, MeasureType::Water, 7).await;

        let err = list_measures(&repo, "nobody", None).await.unwrap_err();
        assert_eq!(err.code(), "MEASURES_NOT_FOUND");

        let err = list_measures(&repo, "12345", Some("GAS")).await.unwrap_err();
        assert_eq!(err.code(), "MEASURES_NOT_FOUND");
        assert_eq!(err.status().as_u16(), 404);
    }
}
