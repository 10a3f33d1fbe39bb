use axum::extract::State;
use axum::Json;
use http::StatusCode;

use crate::announcements::cache_announcement;
use crate::cache::{RECENT_ANNOUNCEMENTS, SPEAKER_ANNOUNCEMENTS};
use crate::error::AppError;
use crate::forms::StringMessage;
use crate::identity::Internal;
use crate::AppState;

fn cached(state: &AppState, key: &str) -> Json<StringMessage> {
    Json(StringMessage {
        data: state.cache.get(key).unwrap_or_default(),
    })
}

pub async fn get_announcement(State(state): State<AppState>) -> Json<StringMessage> {
    cached(&state, RECENT_ANNOUNCEMENTS)
}

pub async fn get_featured_speaker(State(state): State<AppState>) -> Json<StringMessage> {
    cached(&state, SPEAKER_ANNOUNCEMENTS)
}

/// Called by the scheduler.
pub async fn set_announcement(
    State(state): State<AppState>,
    _internal: Internal,
) -> Result<StatusCode, AppError> {
    cache_announcement(&*state.store, &*state.cache).await?;
    Ok(StatusCode::NO_CONTENT)
}
