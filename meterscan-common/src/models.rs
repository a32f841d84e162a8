//! Measure entity and meter types
//!
//! A [`Measure`] is one meter-photo submission together with the reading
//! derived from it. Construction validates every field, so any `Measure`
//! in hand satisfies the entity invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::time::MeasureMonth;
use crate::{Error, Result};

/// Supported meter categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasureType {
    Water,
    Gas,
}

impl MeasureType {
    /// Canonical upper-case name, as persisted and serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Water => "WATER",
            MeasureType::Gas => "GAS",
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureType {
    type Err = Error;

    /// Case-insensitive: "water", "Water" and "WATER" all parse.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WATER" => Ok(MeasureType::Water),
            "GAS" => Ok(MeasureType::Gas),
            other => Err(Error::InvalidInput(format!(
                "Unsupported measure type: {}",
                other
            ))),
        }
    }
}

/// Field set used to construct a [`Measure`]
#[derive(Debug, Clone)]
pub struct NewMeasure {
    /// Internal row id; generated when `None`
    pub id: Option<Uuid>,
    /// Public identifier; generated when `None`
    pub measure_uuid: Option<String>,
    pub customer_code: String,
    pub measure_datetime: DateTime<Utc>,
    pub measure_type: MeasureType,
    pub image_url: String,
    pub measure_value: Option<f64>,
    pub has_confirmed: bool,
}

/// One meter reading
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    id: Uuid,
    measure_uuid: String,
    customer_code: String,
    measure_datetime: DateTime<Utc>,
    measure_type: MeasureType,
    image_url: String,
    measure_value: Option<f64>,
    has_confirmed: bool,
}

impl Measure {
    /// Build a measure, validating every field
    pub fn new(fields: NewMeasure) -> Result<Self> {
        if fields.customer_code.trim().is_empty() {
            return Err(Error::InvalidInput("Customer code is required".to_string()));
        }
        if fields.image_url.trim().is_empty() {
            return Err(Error::InvalidInput("Image URL is required".to_string()));
        }
        if let Some(value) = fields.measure_value {
            validate_value(value)?;
        }

        let measure_uuid = match fields.measure_uuid {
            Some(uuid) if uuid.trim().is_empty() => {
                return Err(Error::InvalidInput("Measure UUID must not be empty".to_string()));
            }
            Some(uuid) => uuid,
            None => Uuid::new_v4().to_string(),
        };

        Ok(Self {
            id: fields.id.unwrap_or_else(Uuid::new_v4),
            measure_uuid,
            customer_code: fields.customer_code,
            measure_datetime: fields.measure_datetime,
            measure_type: fields.measure_type,
            image_url: fields.image_url,
            measure_value: fields.measure_value,
            has_confirmed: fields.has_confirmed,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn measure_uuid(&self) -> &str {
        &self.measure_uuid
    }

    pub fn customer_code(&self) -> &str {
        &self.customer_code
    }

    pub fn measure_datetime(&self) -> DateTime<Utc> {
        self.measure_datetime
    }

    pub fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn measure_value(&self) -> Option<f64> {
        self.measure_value
    }

    pub fn has_confirmed(&self) -> bool {
        self.has_confirmed
    }

    /// Calendar month (UTC) of the reading
    pub fn month(&self) -> MeasureMonth {
        MeasureMonth::of(&self.measure_datetime)
    }

    /// Record the human-confirmed value. One-shot: a confirmed measure
    /// cannot be confirmed again.
    pub fn confirm(&mut self, value: f64) -> Result<()> {
        if self.has_confirmed {
            return Err(Error::AlreadyConfirmed(self.measure_uuid.clone()));
        }
        validate_value(value)?;

        self.measure_value = Some(value);
        self.has_confirmed = true;
        Ok(())
    }
}

fn validate_value(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(
            "Measure value must be greater than or equal to zero".to_string(),
        ));
    }
    Ok(())
}
