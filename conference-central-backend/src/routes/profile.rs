use axum::extract::State;
use axum::Json;
use conference_central_database::models::{Profile, TeeShirtSize};
use tracing::info;

use super::ApiJson;
use crate::error::AppError;
use crate::forms::{ProfileForm, ProfileMiniForm};
use crate::identity::User;
use crate::AppState;

/// Loads the profile of `user`, creating it on first access.
pub async fn profile_from_user(state: &AppState, user: &User) -> Result<Profile, AppError> {
    if let Some(profile) = state.store.profile(&user.id).await? {
        return Ok(profile);
    }
    info!(user_id = %user.id, "creating profile");
    Ok(state
        .store
        .insert_profile(Profile::new(
            user.id.clone(),
            user.nickname.clone(),
            user.email.clone(),
        ))
        .await?)
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<ProfileForm>, AppError> {
    let profile = profile_from_user(&state, &user).await?;
    Ok(Json(ProfileForm::from(&profile)))
}

/// Copies the non-empty fields of the form.
pub async fn save_profile(
    State(state): State<AppState>,
    user: User,
    ApiJson(form): ApiJson<ProfileMiniForm>,
) -> Result<Json<ProfileForm>, AppError> {
    let display_name = form.display_name.filter(|name| !name.is_empty());
    let tee_shirt_size = form
        .tee_shirt_size
        .filter(|size| !size.is_empty())
        .map(|size| {
            size.parse::<TeeShirtSize>()
                .map(|size| size.as_str().to_owned())
                .map_err(|err| AppError::bad_request(err.to_string()))
        })
        .transpose()?;

    profile_from_user(&state, &user).await?;
    let profile = state
        .store
        .update_profile_details(&user.id, display_name, tee_shirt_size)
        .await?;
    Ok(Json(ProfileForm::from(&profile)))
}
