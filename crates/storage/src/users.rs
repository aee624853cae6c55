//! Users and API tokens.
//!
//! Reviewers and admins authenticate with a bearer token stored on their
//! row. Tokens are never serialised back out.

use crate::store::{is_unique_violation, query_failed, Store};
use cdi_common::review::ReviewerInfo;
use cdi_common::{CdiError, CdiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Reviewer,
}

impl Role {
    pub fn code(&self) -> i64 {
        match self {
            Role::Admin => 1,
            Role::Reviewer => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Role::Admin),
            2 => Some(Role::Reviewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub technical_working_group: Option<String>,
    pub email_verified: bool,
    #[serde(skip)]
    pub api_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn reviewer_info(&self) -> ReviewerInfo {
        ReviewerInfo {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            technical_working_group: self.technical_working_group.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub technical_working_group: Option<String>,
    pub api_token: Option<String>,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    role: i64,
    technical_working_group: Option<String>,
    email_verified: bool,
    api_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CdiError;

    fn try_from(row: UserRow) -> CdiResult<Self> {
        let role = Role::from_code(row.role)
            .ok_or_else(|| CdiError::DatabaseError(format!("unknown role {}", row.role)))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            technical_working_group: row.technical_working_group,
            email_verified: row.email_verified,
            api_token: row.api_token,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, name, email, role, technical_working_group, email_verified, api_token, created_at";

impl Store {
    /// Register a user.
    ///
    /// # Errors
    ///
    /// A duplicate email is reported as an invalid `email` field rather
    /// than a database error.
    pub async fn create_user(&self, user: &NewUser) -> CdiResult<User> {
        let id = sqlx::query(
            r#"
            INSERT INTO users (name, email, role, technical_working_group, email_verified, api_token, created_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.code())
        .bind(&user.technical_working_group)
        .bind(&user.api_token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CdiError::invalid("email", format!("{} is already registered", user.email))
            } else {
                query_failed(e)
            }
        })?
        .last_insert_rowid();

        info!(user_id = id, email = %user.email, role = ?user.role, "Created user");
        self.get_user(id).await?.ok_or(CdiError::NotFound("User"))
    }

    pub async fn get_user(&self, id: i64) -> CdiResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_user_by_token(&self, token: &str) -> CdiResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE api_token = ?", USER_COLUMNS))
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;
        row.map(User::try_from).transpose()
    }

    pub async fn list_reviewers(&self) -> CdiResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY name ASC",
            USER_COLUMNS
        ))
        .bind(Role::Reviewer.code())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.into_iter().map(User::try_from).collect()
    }
}
