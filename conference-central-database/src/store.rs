use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::models::{Conference, ConferenceUpdate, NewConference, NewSession, Profile, Session};
use crate::query::{ConferenceQuery, SessionQuery};

/// Conferences with at most this many seats left are announced as nearly sold out.
pub const NEARLY_SOLD_OUT_SEATS: i32 = 5;

/// Persistence for profiles, conferences and sessions.
///
/// Methods touching more than one entity are atomic. Lookups by key list keep the
/// order of the keys and skip keys that don't resolve.
#[async_trait]
pub trait Store: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    async fn profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>, DatabaseError>;

    /// Inserts the profile unless one already exists and returns the stored one.
    async fn insert_profile(&self, profile: Profile) -> Result<Profile, DatabaseError>;

    async fn update_profile_details(
        &self,
        user_id: &str,
        display_name: Option<String>,
        tee_shirt_size: Option<String>,
    ) -> Result<Profile, DatabaseError>;

    async fn insert_conference(
        &self,
        conference: NewConference,
    ) -> Result<Conference, DatabaseError>;

    async fn conference(&self, id: i64) -> Result<Option<Conference>, DatabaseError>;

    async fn conferences(&self, ids: &[i64]) -> Result<Vec<Conference>, DatabaseError>;

    async fn conferences_by_organizer(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conference>, DatabaseError>;

    async fn query_conferences(
        &self,
        query: &ConferenceQuery,
    ) -> Result<Vec<Conference>, DatabaseError>;

    /// Names of conferences with `1..=NEARLY_SOLD_OUT_SEATS` seats available.
    async fn nearly_sold_out_conferences(&self) -> Result<Vec<String>, DatabaseError>;

    /// Fails with `NotFound`, or `Forbidden` when `organizer_user_id` doesn't own it.
    async fn update_conference(
        &self,
        organizer_user_id: &str,
        id: i64,
        update: ConferenceUpdate,
    ) -> Result<Conference, DatabaseError>;

    /// Registers the profile for the conference, see [`Profile::register`].
    async fn register(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError>;

    async fn unregister(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError>;

    async fn insert_session(&self, session: NewSession) -> Result<Session, DatabaseError>;

    async fn session(&self, id: i64) -> Result<Option<Session>, DatabaseError>;

    async fn sessions(&self, ids: &[i64]) -> Result<Vec<Session>, DatabaseError>;

    async fn query_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, DatabaseError>;

    /// Ignores `order` and `limit`.
    async fn count_sessions(&self, query: &SessionQuery) -> Result<i64, DatabaseError>;

    /// Fails with `NotFound` when the session doesn't exist.
    async fn add_to_wishlist(&self, user_id: &str, session_id: i64) -> Result<(), DatabaseError>;

    async fn remove_from_wishlist(
        &self,
        user_id: &str,
        session_id: i64,
    ) -> Result<bool, DatabaseError>;
}
