use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// CompanyLocation
///
/// A saved site owned by an agency. Jobs snapshot it into a `JobLocation`; shifts copy
/// its address and coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CompanyLocation {
    pub id: Uuid,
    pub company_id: Uuid,
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub special_requirements: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateLocationRequest {
    #[schema(example = "Riverside Warehouse")]
    pub location_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub special_requirements: Option<String>,
}

/// UpdateLocationRequest
///
/// Partial update; only provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateLocationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,
}

impl CompanyLocation {
    /// Folds a partial update into the stored row.
    pub fn apply(&mut self, req: UpdateLocationRequest) {
        if let Some(name) = req.location_name {
            self.location_name = name;
        }
        if let Some(address) = req.address {
            self.address = address;
        }
        if req.latitude.is_some() {
            self.latitude = req.latitude;
        }
        if req.longitude.is_some() {
            self.longitude = req.longitude;
        }
        if req.special_requirements.is_some() {
            self.special_requirements = req.special_requirements;
        }
    }
}
