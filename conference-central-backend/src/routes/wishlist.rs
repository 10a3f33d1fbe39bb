use axum::extract::{Path, State};
use axum::Json;
use tracing::{debug, info};

use super::profile::profile_from_user;
use crate::error::AppError;
use crate::forms::{parse_key, BooleanMessage, SessionForms};
use crate::identity::User;
use crate::AppState;

pub async fn add_session_to_wishlist(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    profile_from_user(&state, &user).await?;
    let session_id = parse_key("session", &key)?;
    state.store.add_to_wishlist(&user.id, session_id).await?;
    info!(session_id, user_id = %user.id, "added session to wishlist");
    Ok(Json(BooleanMessage { data: true }))
}

pub async fn get_sessions_in_wishlist(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<SessionForms>, AppError> {
    let profile = profile_from_user(&state, &user).await?;
    let sessions = state.store.sessions(&profile.session_wishlist_keys).await?;
    Ok(Json(SessionForms::from_sessions(&sessions)))
}

/// Always answers `true`, whether or not the session was on the wishlist.
pub async fn delete_session_in_wishlist(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    profile_from_user(&state, &user).await?;
    let session_id = parse_key("session", &key)?;
    let removed = state
        .store
        .remove_from_wishlist(&user.id, session_id)
        .await?;
    debug!(session_id, removed, user_id = %user.id, "removed session from wishlist");
    Ok(Json(BooleanMessage { data: true }))
}
