use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewSignup, Signup};
use crate::routes::auth::{generate_token, hash_token};
use crate::schema::signups;
use crate::services::email;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSignupRequest {
    pub email: String,
    pub name: String,
    pub institution: Option<String>,
    pub research_area: Option<String>,
    pub interest_level: Option<String>,
    #[serde(default)]
    pub consent: bool,
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub email: String,
}

pub async fn create_signup(
    State(state): State<AppState>,
    Json(payload): Json<CreateSignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let email_addr = payload.email.trim().to_lowercase();
    if email_addr.is_empty() || !email_addr.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if !payload.consent {
        return Err(AppError::bad_request("consent is required to sign up"));
    }
    if let Some(level) = payload.interest_level.as_deref() {
        if !["exploring", "ready", "migrating"].contains(&level) {
            return Err(AppError::bad_request(
                "interest level must be 'exploring', 'ready', or 'migrating'",
            ));
        }
    }

    let unsubscribe_token = generate_token();
    let new_signup = NewSignup {
        id: Uuid::new_v4(),
        email: email_addr,
        name,
        institution: payload.institution,
        research_area: payload.research_area,
        interest_level: payload.interest_level,
        status: "active".to_string(),
        unsubscribe_token_hash: hash_token(&unsubscribe_token),
        source: payload.source.unwrap_or_else(|| "website".to_string()),
        consent: true,
    };

    let mut conn = state.db()?;
    match diesel::insert_into(signups::table)
        .values(&new_signup)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("email is already signed up"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let signup: Signup = signups::table.find(new_signup.id).first(&mut conn)?;
    drop(conn);

    let unsubscribe_url = format!(
        "{}/signup/unsubscribe/{}",
        state.config.base_url.trim_end_matches('/'),
        unsubscribe_token
    );
    let (subject, html) = email::signup_confirmation(&signup.name, &unsubscribe_url);
    if let Err(err) = state.mailer.send(&signup.email, &subject, &html).await {
        warn!(error = %err, signup_id = %signup.id, "failed to send signup confirmation");
    }

    info!(signup_id = %signup.id, "signup recorded");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: signup.id,
            email: signup.email,
            name: signup.name,
            status: signup.status,
        }),
    ))
}

pub async fn signup_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let email_addr = query.email.trim().to_lowercase();
    let mut conn = state.db()?;

    let signup: Option<Signup> = signups::table
        .filter(signups::email.eq(&email_addr))
        .filter(signups::deleted_at.is_null())
        .first(&mut conn)
        .optional()?;

    Ok(Json(match signup {
        Some(signup) => json!({ "registered": true, "status": signup.status }),
        None => json!({ "registered": false }),
    }))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<StatusCode> {
    let hashed = hash_token(&token);
    let mut conn = state.db()?;

    let updated = diesel::update(
        signups::table
            .filter(signups::unsubscribe_token_hash.eq(&hashed))
            .filter(signups::deleted_at.is_null()),
    )
    .set((
        signups::status.eq("unsubscribed"),
        signups::deleted_at.eq(Some(Utc::now())),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
