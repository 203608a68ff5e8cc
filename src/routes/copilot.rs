use axum::extract::{Json, State};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::schema::files;
use crate::services::copilot::{self, ProviderError};
use crate::state::AppState;

const MAX_MESSAGE_LENGTH: usize = 8_000;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// When set, the file's source is folded into the system prompt.
    pub file_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub provider: &'static str,
}

pub async fn chat(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }
    if message.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::bad_request("message is too long"));
    }

    let context = match payload.file_id {
        Some(file_id) => {
            let mut conn = state.db()?;
            let source: String = files::table
                .filter(files::id.eq(file_id))
                .filter(files::owner_id.eq(auth.user_id))
                .filter(files::deleted_at.is_null())
                .select(files::source)
                .first(&mut conn)
                .optional()?
                .ok_or_else(AppError::not_found)?;
            Some(source)
        }
        None => None,
    };

    let system = copilot::system_prompt_with_context(context.as_deref());
    debug!(provider = state.copilot.name(), "dispatching chat request");

    let reply = state
        .copilot
        .complete(&system, &message)
        .await
        .map_err(|err| match err {
            ProviderError::Unavailable(_) => AppError::unavailable(err.to_string()),
            ProviderError::RateLimited => AppError::rate_limited(err.to_string()),
            ProviderError::Failed(_) => AppError::internal(err),
        })?;

    Ok(Json(ChatResponse {
        reply,
        provider: state.copilot.name(),
    }))
}
