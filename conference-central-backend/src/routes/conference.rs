use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use conference_central_database::error::DatabaseError;
use conference_central_database::models::Conference;
use conference_central_database::query::ConferenceQuery;
use tracing::info;

use super::profile::profile_from_user;
use super::ApiJson;
use crate::error::AppError;
use crate::forms::{
    parse_key, BooleanMessage, ConferenceForm, ConferenceForms, ConferenceQueryForms,
};
use crate::identity::User;
use crate::tasks::Task;
use crate::AppState;

/// Conference forms with the display names of their organizers.
async fn conference_forms(
    state: &AppState,
    conferences: &[Conference],
) -> Result<ConferenceForms, AppError> {
    let mut organizers: Vec<String> = conferences
        .iter()
        .map(|conference| conference.organizer_user_id.clone())
        .collect();
    organizers.sort_unstable();
    organizers.dedup();
    let display_names: HashMap<String, String> = state
        .store
        .profiles(&organizers)
        .await?
        .into_iter()
        .map(|profile| (profile.user_id, profile.display_name))
        .collect();
    Ok(ConferenceForms {
        items: conferences
            .iter()
            .map(|conference| {
                ConferenceForm::from_conference(
                    conference,
                    display_names.get(&conference.organizer_user_id).cloned(),
                )
            })
            .collect(),
    })
}

async fn organizer_display_name(
    state: &AppState,
    conference: &Conference,
) -> Result<Option<String>, AppError> {
    Ok(state
        .store
        .profile(&conference.organizer_user_id)
        .await?
        .map(|profile| profile.display_name))
}

pub async fn create_conference(
    State(state): State<AppState>,
    user: User,
    ApiJson(form): ApiJson<ConferenceForm>,
) -> Result<Json<ConferenceForm>, AppError> {
    let new_conference = form.into_new_conference(user.id.clone())?;
    let profile = profile_from_user(&state, &user).await?;
    let conference = state.store.insert_conference(new_conference).await?;
    info!(conference_id = conference.id, organizer = %user.id, "created conference");

    let form = ConferenceForm::from_conference(&conference, Some(profile.display_name));
    if !user.email.is_empty() {
        state.tasks.enqueue(Task::SendConfirmationEmail {
            email: user.email,
            conference_info: serde_json::to_string_pretty(&form)?,
        })?;
    }
    Ok(Json(form))
}

pub async fn update_conference(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
    ApiJson(form): ApiJson<ConferenceForm>,
) -> Result<Json<ConferenceForm>, AppError> {
    let conference_id = parse_key("conference", &key)?;
    let update = form.into_update()?;
    let conference = state
        .store
        .update_conference(&user.id, conference_id, update)
        .await?;
    info!(conference_id, "updated conference");
    let display_name = organizer_display_name(&state, &conference).await?;
    Ok(Json(ConferenceForm::from_conference(&conference, display_name)))
}

pub async fn get_conference(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ConferenceForm>, AppError> {
    let conference_id = parse_key("conference", &key)?;
    let conference = state
        .store
        .conference(conference_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("conference", &key))?;
    let display_name = organizer_display_name(&state, &conference).await?;
    Ok(Json(ConferenceForm::from_conference(&conference, display_name)))
}

pub async fn get_conferences_created(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<ConferenceForms>, AppError> {
    let profile = profile_from_user(&state, &user).await?;
    let conferences = state.store.conferences_by_organizer(&user.id).await?;
    Ok(Json(ConferenceForms {
        items: conferences
            .iter()
            .map(|conference| {
                ConferenceForm::from_conference(conference, Some(profile.display_name.clone()))
            })
            .collect(),
    }))
}

pub async fn query_conferences(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<ConferenceQueryForms>,
) -> Result<Json<ConferenceForms>, AppError> {
    let query = ConferenceQuery::compile(form.filters.iter().map(|filter| {
        (
            filter.field.as_str(),
            filter.operator.as_str(),
            filter.value.as_str(),
        )
    }))?;
    let conferences = state.store.query_conferences(&query).await?;
    Ok(Json(conference_forms(&state, &conferences).await?))
}

/// London conferences on Medical Innovations in June.
pub async fn filter_playground(
    State(state): State<AppState>,
) -> Result<Json<ConferenceForms>, AppError> {
    let query = ConferenceQuery::compile([
        ("CITY", "EQ", "London"),
        ("TOPIC", "EQ", "Medical Innovations"),
        ("MONTH", "EQ", "6"),
    ])?;
    let conferences = state.store.query_conferences(&query).await?;
    Ok(Json(ConferenceForms {
        items: conferences
            .iter()
            .map(|conference| ConferenceForm::from_conference(conference, None))
            .collect(),
    }))
}

pub async fn register_for_conference(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    profile_from_user(&state, &user).await?;
    let conference_id = parse_key("conference", &key)?;
    state.store.register(&user.id, conference_id).await?;
    info!(conference_id, user_id = %user.id, "registered");
    Ok(Json(BooleanMessage { data: true }))
}

pub async fn unregister_from_conference(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
) -> Result<Json<BooleanMessage>, AppError> {
    profile_from_user(&state, &user).await?;
    let conference_id = parse_key("conference", &key)?;
    state.store.unregister(&user.id, conference_id).await?;
    info!(conference_id, user_id = %user.id, "unregistered");
    Ok(Json(BooleanMessage { data: true }))
}

pub async fn get_conferences_to_attend(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<ConferenceForms>, AppError> {
    let profile = profile_from_user(&state, &user).await?;
    let conferences = state
        .store
        .conferences(&profile.conference_keys_to_attend)
        .await?;
    Ok(Json(conference_forms(&state, &conferences).await?))
}
