//! Entry points for work pushed by an external task queue. The in-process
//! worker runs the same code.

use axum::extract::State;
use http::StatusCode;

use super::ApiForm;
use crate::error::AppError;
use crate::forms::{ConfirmationEmailParams, FeaturedSpeakerParams};
use crate::identity::Internal;
use crate::AppState;

pub async fn send_confirmation_email(
    State(state): State<AppState>,
    _internal: Internal,
    ApiForm(params): ApiForm<ConfirmationEmailParams>,
) -> Result<StatusCode, AppError> {
    state
        .runner
        .send_confirmation_email(params.email, &params.conference_info)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn determine_featured_speaker(
    State(state): State<AppState>,
    _internal: Internal,
    ApiForm(params): ApiForm<FeaturedSpeakerParams>,
) -> Result<StatusCode, AppError> {
    state
        .runner
        .determine_featured_speaker(&params.websafe_conference_key, &params.speaker)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
