use async_trait::async_trait;
use uuid::Uuid;

use super::PostgresRepository;
use crate::{
    error::{AppError, AppResult},
    models::{CompanyLocation, CreateLocationRequest},
    repository::LocationRepository,
};

const LOCATION_COLUMNS: &str = "id, company_id, location_name, address, latitude, longitude, \
                                special_requirements, created_at, updated_at";

#[async_trait]
impl LocationRepository for PostgresRepository {
    async fn create_location(&self, company_id: Uuid, req: CreateLocationRequest) -> AppResult<CompanyLocation> {
        let location = sqlx::query_as::<_, CompanyLocation>(&format!(
            "INSERT INTO company_locations \
                 (id, company_id, location_name, address, latitude, longitude, special_requirements) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(req.location_name)
        .bind(req.address)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(req.special_requirements)
        .fetch_one(&self.pool)
        .await?;
        Ok(location)
    }

    async fn list_locations(&self, company_id: Uuid) -> AppResult<Vec<CompanyLocation>> {
        let locations = sqlx::query_as::<_, CompanyLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM company_locations WHERE company_id = $1 ORDER BY created_at DESC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn get_location(&self, id: Uuid, company_id: Uuid) -> AppResult<Option<CompanyLocation>> {
        let location = sqlx::query_as::<_, CompanyLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM company_locations WHERE id = $1 AND company_id = $2"
        ))
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(location)
    }

    async fn save_location(&self, location: &CompanyLocation) -> AppResult<CompanyLocation> {
        sqlx::query_as::<_, CompanyLocation>(&format!(
            "UPDATE company_locations \
             SET location_name = $3, address = $4, latitude = $5, longitude = $6, \
                 special_requirements = $7, updated_at = NOW() \
             WHERE id = $1 AND company_id = $2 RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(location.id)
        .bind(location.company_id)
        .bind(&location.location_name)
        .bind(&location.address)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.special_requirements)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))
    }

    async fn delete_location(&self, id: Uuid, company_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM company_locations WHERE id = $1 AND company_id = $2")
            .bind(id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
