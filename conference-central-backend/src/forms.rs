//! JSON request and response bodies of the public API.

use chrono::{NaiveDate, NaiveTime};
use conference_central_database::error::DatabaseError;
use conference_central_database::models::{
    month_of, Conference, ConferenceUpdate, NewConference, NewSession, Profile, Session,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_CITY: &str = "Default City";
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];
pub const DEFAULT_SPEAKER: &str = "Default Speaker";
pub const DEFAULT_HIGHLIGHTS: [&str; 2] = ["Default", "Highlight"];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Resolves a websafe key to an id. Keys that don't parse can't exist.
pub fn parse_key(kind: &'static str, key: &str) -> Result<i64, AppError> {
    key.parse()
        .map_err(|_| DatabaseError::not_found(kind, key).into())
}

#[must_use]
pub fn websafe_key(id: i64) -> String {
    id.to_string()
}

/// Reads `YYYY-MM-DD` from the first ten characters.
pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    let prefix = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(prefix, DATE_FORMAT)
        .map_err(|_| AppError::bad_request(format!("Invalid date {value:?}, expected YYYY-MM-DD")))
}

/// Reads `HH:MM` from the first five characters.
pub fn parse_time(value: &str) -> Result<NaiveTime, AppError> {
    let prefix = value.get(..5).unwrap_or(value);
    NaiveTime::parse_from_str(prefix, TIME_FORMAT)
        .map_err(|_| AppError::bad_request(format!("Invalid time {value:?}, expected HH:MM")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|&value| value.to_owned()).collect()
}

/// Lists count as missing when empty.
fn non_empty(values: Option<Vec<String>>) -> Option<Vec<String>> {
    values.filter(|values| !values.is_empty())
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_display_name: Option<String>,
}

impl ConferenceForm {
    #[must_use]
    pub fn from_conference(
        conference: &Conference,
        organizer_display_name: Option<String>,
    ) -> Self {
        Self {
            name: Some(conference.name.clone()),
            description: conference.description.clone(),
            organizer_user_id: Some(conference.organizer_user_id.clone()),
            topics: Some(conference.topics.clone()),
            city: Some(conference.city.clone()),
            start_date: conference.start_date.map(format_date),
            month: Some(conference.month),
            max_attendees: Some(conference.max_attendees),
            seats_available: Some(conference.seats_available),
            end_date: conference.end_date.map(format_date),
            websafe_key: Some(websafe_key(conference.id)),
            organizer_display_name: organizer_display_name.filter(|name| !name.is_empty()),
        }
    }

    /// Applies creation defaults. Every conference starts with all seats free.
    pub fn into_new_conference(self, organizer_user_id: String) -> Result<NewConference, AppError> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("Conference 'name' field required"))?;
        let max_attendees = self.max_attendees.unwrap_or(0);
        if max_attendees < 0 {
            return Err(AppError::bad_request("maxAttendees can't be negative"));
        }
        let start_date = self.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = self.end_date.as_deref().map(parse_date).transpose()?;
        Ok(NewConference {
            organizer_user_id,
            name,
            description: self.description,
            topics: non_empty(self.topics).unwrap_or_else(|| owned(&DEFAULT_TOPICS)),
            city: self.city.unwrap_or_else(|| DEFAULT_CITY.to_owned()),
            start_date,
            end_date,
            month: month_of(start_date),
            max_attendees,
            seats_available: max_attendees,
        })
    }

    /// Only the provided fields. `month` and `seatsAvailable` are derived and
    /// ignored here.
    pub fn into_update(self) -> Result<ConferenceUpdate, AppError> {
        if let Some(max_attendees) = self.max_attendees {
            if max_attendees < 0 {
                return Err(AppError::bad_request("maxAttendees can't be negative"));
            }
        }
        Ok(ConferenceUpdate {
            name: self.name.filter(|name| !name.is_empty()),
            description: self.description,
            topics: non_empty(self.topics),
            city: self.city,
            start_date: self.start_date.as_deref().map(parse_date).transpose()?,
            end_date: self.end_date.as_deref().map(parse_date).transpose()?,
            max_attendees: self.max_attendees,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConferenceForms {
    pub items: Vec<ConferenceForm>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConferenceQueryForm {
    pub field: String,
    pub operator: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConferenceQueryForms {
    pub filters: Vec<ConferenceQueryForm>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    pub display_name: String,
    pub main_email: String,
    pub tee_shirt_size: String,
    pub conference_keys_to_attend: Vec<String>,
    pub session_keys_wishlist: Vec<String>,
}

impl From<&Profile> for ProfileForm {
    fn from(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            main_email: profile.main_email.clone(),
            tee_shirt_size: profile.tee_shirt_size.clone(),
            conference_keys_to_attend: profile
                .conference_keys_to_attend
                .iter()
                .copied()
                .map(websafe_key)
                .collect(),
            session_keys_wishlist: profile
                .session_wishlist_keys
                .iter()
                .copied()
                .map(websafe_key)
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileMiniForm {
    pub display_name: Option<String>,
    pub tee_shirt_size: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_conference_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_session_key: Option<String>,
}

impl SessionForm {
    pub fn into_new_session(self, conference_id: i64) -> Result<NewSession, AppError> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("Session 'name' field required"))?;
        Ok(NewSession {
            conference_id,
            name,
            highlights: non_empty(self.highlights).unwrap_or_else(|| owned(&DEFAULT_HIGHLIGHTS)),
            speaker: self.speaker.unwrap_or_else(|| DEFAULT_SPEAKER.to_owned()),
            duration: self.duration.as_deref().map(parse_time).transpose()?,
            type_of_session: self.type_of_session,
            session_date: self.date.as_deref().map(parse_date).transpose()?,
            start_time: self.start_time.as_deref().map(parse_time).transpose()?,
        })
    }
}

impl From<&Session> for SessionForm {
    fn from(session: &Session) -> Self {
        Self {
            name: Some(session.name.clone()),
            highlights: Some(session.highlights.clone()),
            speaker: Some(session.speaker.clone()),
            duration: session.duration.map(format_time),
            type_of_session: session.type_of_session.clone(),
            date: session.session_date.map(format_date),
            start_time: session.start_time.map(format_time),
            websafe_conference_key: Some(websafe_key(session.conference_id)),
            websafe_session_key: Some(websafe_key(session.id)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionForms {
    pub items: Vec<SessionForm>,
}

impl SessionForms {
    #[must_use]
    pub fn from_sessions(sessions: &[Session]) -> Self {
        Self {
            items: sessions.iter().map(SessionForm::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StringMessage {
    pub data: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BooleanMessage {
    pub data: bool,
}

/// Body of `/tasks/send_confirmation_email`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationEmailParams {
    pub email: String,
    pub conference_info: String,
}

/// Body of `/tasks/determine_featured_speaker`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedSpeakerParams {
    pub websafe_conference_key: String,
    pub speaker: String,
}
