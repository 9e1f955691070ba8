use async_trait::async_trait;
use uuid::Uuid;

use super::{PostgresRepository, conflict_on_unique};
use crate::{
    error::{AppError, AppResult},
    models::{CompanyProfile, GuardProfile, NewAccount, Role, User, UserStatus, UserSummary},
    repository::UserRepository,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, role, status, email_verified, \
                            phone_verified, last_login, created_at, updated_at";

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// create_account
    ///
    /// User, wallet and profile go in one transaction; a failure in any of them leaves no
    /// partial account behind.
    async fn create_account(&self, account: NewAccount) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, phone, role, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.phone)
        .bind(account.role)
        .bind(account.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "User with this email already exists"))?;

        sqlx::query("INSERT INTO wallets (id, user_id, balance_cents, currency) VALUES ($1, $2, 0, 'USD')")
            .bind(Uuid::new_v4())
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        match account.role {
            Role::Agency => {
                sqlx::query("INSERT INTO company_profiles (id, user_id, company_name) VALUES ($1, $2, $3)")
                    .bind(Uuid::new_v4())
                    .bind(user.id)
                    .bind(&account.name)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Guard => {
                sqlx::query("INSERT INTO guard_profiles (id, user_id) VALUES ($1, $2)")
                    .bind(Uuid::new_v4())
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
            }
            Role::Admin => {}
        }

        tx.commit().await?;
        tracing::info!(user_id = %user.id, role = ?user.role, "account created");
        Ok(user)
    }

    async fn update_user_contact(&self, id: Uuid, name: Option<String>, phone: Option<String>) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = COALESCE($2, name), phone = COALESCE($3, phone), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_guard_profile(&self, user_id: Uuid) -> AppResult<Option<GuardProfile>> {
        let profile = sqlx::query_as::<_, GuardProfile>(
            "SELECT id, user_id, city, country, experience_years, hourly_rate_cents, availability, \
                    is_armed, license_number, verification_status, created_at \
             FROM guard_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn get_company_profile(&self, user_id: Uuid) -> AppResult<Option<CompanyProfile>> {
        let profile = sqlx::query_as::<_, CompanyProfile>(
            "SELECT id, user_id, company_name, license_number, address, city, country, website, \
                    description, verification_status, created_at \
             FROM company_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let summaries = sqlx::query_as::<_, UserSummary>("SELECT id, name, email FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(summaries)
    }
}
