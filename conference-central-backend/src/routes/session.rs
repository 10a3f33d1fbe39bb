use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use conference_central_database::error::DatabaseError;
use conference_central_database::query::{SessionOrder, SessionQuery};
use tracing::{debug, info};

use super::ApiJson;
use crate::error::AppError;
use crate::forms::{parse_key, websafe_key, SessionForm, SessionForms};
use crate::identity::User;
use crate::tasks::Task;
use crate::AppState;

const WORKSHOP: &str = "workshop";
const SHOWCASE_DATE: Option<NaiveDate> = NaiveDate::from_ymd_opt(2015, 3, 15);
const AFTERNOON: Option<NaiveTime> = NaiveTime::from_hms_opt(15, 0, 0);
const EVENING: Option<NaiveTime> = NaiveTime::from_hms_opt(19, 0, 0);

async fn sessions(state: &AppState, query: &SessionQuery) -> Result<Json<SessionForms>, AppError> {
    let sessions = state.store.query_sessions(query).await?;
    Ok(Json(SessionForms::from_sessions(&sessions)))
}

/// Resolves the key of an existing conference.
async fn conference_id(state: &AppState, key: &str) -> Result<i64, AppError> {
    let conference_id = parse_key("conference", key)?;
    if state.store.conference(conference_id).await?.is_none() {
        return Err(DatabaseError::not_found("conference", key).into());
    }
    Ok(conference_id)
}

pub async fn create_session(
    State(state): State<AppState>,
    user: User,
    Path(key): Path<String>,
    ApiJson(form): ApiJson<SessionForm>,
) -> Result<Json<SessionForm>, AppError> {
    let conference_id = parse_key("conference", &key)?;
    let new_session = form.into_new_session(conference_id)?;
    let conference = state
        .store
        .conference(conference_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("conference", &key))?;
    if conference.organizer_user_id != user.id {
        return Err(
            DatabaseError::forbidden("Only the owner can update the conference.").into(),
        );
    }

    let session = state.store.insert_session(new_session).await?;
    info!(session_id = session.id, conference_id, "created session");
    state.tasks.enqueue(Task::DetermineFeaturedSpeaker {
        conference_key: websafe_key(conference_id),
        speaker: session.speaker.clone(),
    })?;
    Ok(Json(SessionForm::from(&session)))
}

pub async fn get_conference_sessions(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SessionForms>, AppError> {
    let conference_id = conference_id(&state, &key).await?;
    sessions(&state, &SessionQuery::in_conference(conference_id)).await
}

pub async fn get_conference_sessions_by_type(
    State(state): State<AppState>,
    Path((key, type_of_session)): Path<(String, String)>,
) -> Result<Json<SessionForms>, AppError> {
    let conference_id = conference_id(&state, &key).await?;
    sessions(
        &state,
        &SessionQuery {
            type_of_session: Some(type_of_session),
            ..SessionQuery::in_conference(conference_id)
        },
    )
    .await
}

pub async fn get_sessions_by_speaker(
    State(state): State<AppState>,
    Path(speaker): Path<String>,
) -> Result<Json<SessionForms>, AppError> {
    sessions(
        &state,
        &SessionQuery {
            speaker: Some(speaker),
            ..SessionQuery::default()
        },
    )
    .await
}

/// Sessions on 2015-03-15 starting after 15:00.
pub async fn first_query(State(state): State<AppState>) -> Result<Json<SessionForms>, AppError> {
    sessions(
        &state,
        &SessionQuery {
            session_date: SHOWCASE_DATE,
            starts_after: AFTERNOON,
            ..SessionQuery::default()
        },
    )
    .await
}

/// Workshops on 2015-03-15 starting after 15:00.
pub async fn second_query(State(state): State<AppState>) -> Result<Json<SessionForms>, AppError> {
    sessions(
        &state,
        &SessionQuery {
            session_date: SHOWCASE_DATE,
            starts_after: AFTERNOON,
            type_of_session: Some(WORKSHOP.to_owned()),
            ..SessionQuery::default()
        },
    )
    .await
}

/// Counts the sessions starting before 19:00, then returns that many
/// non-workshop sessions ordered by type and start time.
///
/// The count spans every type and the fetch has no time bound, so a late
/// session can displace an early workshop.
pub async fn challenge_query(
    State(state): State<AppState>,
) -> Result<Json<SessionForms>, AppError> {
    let before_evening = state
        .store
        .count_sessions(&SessionQuery {
            starts_before: EVENING,
            ..SessionQuery::default()
        })
        .await?;
    debug!(before_evening, "sessions starting before 19:00");
    sessions(
        &state,
        &SessionQuery {
            type_of_session_not: Some(WORKSHOP.to_owned()),
            order: SessionOrder::TypeThenStartTime,
            limit: Some(before_evening),
            ..SessionQuery::default()
        },
    )
    .await
}
