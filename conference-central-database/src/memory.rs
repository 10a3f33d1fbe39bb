use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::models::{Conference, ConferenceUpdate, NewConference, NewSession, Profile, Session};
use crate::query::{ConferenceQuery, SessionQuery};
use crate::store::{Store, NEARLY_SOLD_OUT_SEATS};

#[derive(Default)]
struct MemoryState {
    profiles: BTreeMap<String, Profile>,
    conferences: BTreeMap<i64, Conference>,
    sessions: BTreeMap<i64, Session>,
    last_conference_id: i64,
    last_session_id: i64,
}

impl MemoryState {
    /// Clones of both entities so a rejected mutation leaves the state untouched.
    fn profile_and_conference(
        &self,
        user_id: &str,
        conference_id: i64,
    ) -> Result<(Profile, Conference), DatabaseError> {
        let profile = self
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("profile", user_id))?;
        let conference = self
            .conferences
            .get(&conference_id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("conference", conference_id))?;
        Ok((profile, conference))
    }

    fn put(&mut self, profile: Profile, conference: Conference) {
        self.conferences.insert(conference.id, conference);
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    fn profile_mut(&mut self, user_id: &str) -> Result<&mut Profile, DatabaseError> {
        self.profiles
            .get_mut(user_id)
            .ok_or_else(|| DatabaseError::not_found("profile", user_id))
    }
}

/// Keeps everything in process memory. Every method runs under one lock, which
/// makes each of them a transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, DatabaseError> {
        self.state.lock().map_err(|_| DatabaseError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        Ok(self.state()?.profiles.get(user_id).cloned())
    }

    async fn profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>, DatabaseError> {
        let state = self.state()?;
        Ok(user_ids
            .iter()
            .filter_map(|user_id| state.profiles.get(user_id).cloned())
            .collect())
    }

    async fn insert_profile(&self, profile: Profile) -> Result<Profile, DatabaseError> {
        let mut state = self.state()?;
        Ok(state
            .profiles
            .entry(profile.user_id.clone())
            .or_insert(profile)
            .clone())
    }

    async fn update_profile_details(
        &self,
        user_id: &str,
        display_name: Option<String>,
        tee_shirt_size: Option<String>,
    ) -> Result<Profile, DatabaseError> {
        let mut state = self.state()?;
        let profile = state.profile_mut(user_id)?;
        if let Some(display_name) = display_name {
            profile.display_name = display_name;
        }
        if let Some(tee_shirt_size) = tee_shirt_size {
            profile.tee_shirt_size = tee_shirt_size;
        }
        Ok(profile.clone())
    }

    async fn insert_conference(
        &self,
        conference: NewConference,
    ) -> Result<Conference, DatabaseError> {
        let mut state = self.state()?;
        state.last_conference_id += 1;
        let conference = conference.into_conference(state.last_conference_id);
        state.conferences.insert(conference.id, conference.clone());
        Ok(conference)
    }

    async fn conference(&self, id: i64) -> Result<Option<Conference>, DatabaseError> {
        Ok(self.state()?.conferences.get(&id).cloned())
    }

    async fn conferences(&self, ids: &[i64]) -> Result<Vec<Conference>, DatabaseError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.conferences.get(id).cloned())
            .collect())
    }

    async fn conferences_by_organizer(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conference>, DatabaseError> {
        Ok(self
            .state()?
            .conferences
            .values()
            .filter(|conference| conference.organizer_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn query_conferences(
        &self,
        query: &ConferenceQuery,
    ) -> Result<Vec<Conference>, DatabaseError> {
        let mut conferences: Vec<Conference> = self
            .state()?
            .conferences
            .values()
            .filter(|conference| query.matches(conference))
            .cloned()
            .collect();
        conferences.sort_by(|a, b| query.compare(a, b));
        Ok(conferences)
    }

    async fn nearly_sold_out_conferences(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .state()?
            .conferences
            .values()
            .filter(|conference| {
                conference.seats_available > 0
                    && conference.seats_available <= NEARLY_SOLD_OUT_SEATS
            })
            .map(|conference| conference.name.clone())
            .collect())
    }

    async fn update_conference(
        &self,
        organizer_user_id: &str,
        id: i64,
        update: ConferenceUpdate,
    ) -> Result<Conference, DatabaseError> {
        let mut state = self.state()?;
        let mut conference = state
            .conferences
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("conference", id))?;
        if conference.organizer_user_id != organizer_user_id {
            return Err(DatabaseError::forbidden(
                "Only the owner can update the conference.",
            ));
        }
        conference.apply(update)?;
        state.conferences.insert(id, conference.clone());
        Ok(conference)
    }

    async fn register(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state()?;
        let (mut profile, mut conference) = state.profile_and_conference(user_id, conference_id)?;
        profile.register(&mut conference)?;
        state.put(profile, conference);
        Ok(())
    }

    async fn unregister(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state()?;
        let (mut profile, mut conference) = state.profile_and_conference(user_id, conference_id)?;
        profile.unregister(&mut conference)?;
        state.put(profile, conference);
        Ok(())
    }

    async fn insert_session(&self, session: NewSession) -> Result<Session, DatabaseError> {
        let mut state = self.state()?;
        if !state.conferences.contains_key(&session.conference_id) {
            return Err(DatabaseError::not_found("conference", session.conference_id));
        }
        state.last_session_id += 1;
        let session = session.into_session(state.last_session_id);
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn session(&self, id: i64) -> Result<Option<Session>, DatabaseError> {
        Ok(self.state()?.sessions.get(&id).cloned())
    }

    async fn sessions(&self, ids: &[i64]) -> Result<Vec<Session>, DatabaseError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.sessions.get(id).cloned())
            .collect())
    }

    async fn query_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, DatabaseError> {
        let mut sessions: Vec<Session> = self
            .state()?
            .sessions
            .values()
            .filter(|session| query.matches(session))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            sessions.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(sessions)
    }

    async fn count_sessions(&self, query: &SessionQuery) -> Result<i64, DatabaseError> {
        let count = self
            .state()?
            .sessions
            .values()
            .filter(|session| query.matches(session))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn add_to_wishlist(&self, user_id: &str, session_id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state()?;
        if !state.sessions.contains_key(&session_id) {
            return Err(DatabaseError::not_found("session", session_id));
        }
        state.profile_mut(user_id)?.add_to_wishlist(session_id)
    }

    async fn remove_from_wishlist(
        &self,
        user_id: &str,
        session_id: i64,
    ) -> Result<bool, DatabaseError> {
        let mut state = self.state()?;
        Ok(state.profile_mut(user_id)?.remove_from_wishlist(session_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::query::SessionOrder;

    fn new_conference(organizer: &str, name: &str, max_attendees: i32) -> NewConference {
        NewConference {
            organizer_user_id: organizer.to_owned(),
            name: name.to_owned(),
            description: None,
            topics: vec!["Default".to_owned(), "Topic".to_owned()],
            city: "Default City".to_owned(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees,
            seats_available: max_attendees,
        }
    }

    fn new_session(conference_id: i64, speaker: &str, kind: &str, start: (u32, u32)) -> NewSession {
        NewSession {
            conference_id,
            name: format!("{speaker} talks"),
            highlights: Vec::new(),
            speaker: speaker.to_owned(),
            duration: None,
            type_of_session: Some(kind.to_owned()),
            session_date: None,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0),
        }
    }

    async fn store_with_attendee() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_profile(Profile::new(
                "attendee".to_owned(),
                "Attendee".to_owned(),
                "attendee@example.com".to_owned(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn insert_profile_keeps_existing_profile() {
        let store = store_with_attendee().await;
        let again = store
            .insert_profile(Profile::new(
                "attendee".to_owned(),
                "Someone Else".to_owned(),
                "else@example.com".to_owned(),
            ))
            .await
            .unwrap();
        assert_eq!(again.display_name, "Attendee");
    }

    #[tokio::test]
    async fn registration_round_trip() {
        let store = store_with_attendee().await;
        let conference = store
            .insert_conference(new_conference("organizer", "DevCon", 1))
            .await
            .unwrap();

        store.register("attendee", conference.id).await.unwrap();
        let full = store.conference(conference.id).await.unwrap().unwrap();
        assert_eq!(full.seats_available, 0);

        store.unregister("attendee", conference.id).await.unwrap();
        let restored = store.conference(conference.id).await.unwrap().unwrap();
        assert_eq!(restored, conference);
        let profile = store.profile("attendee").await.unwrap().unwrap();
        assert!(profile.conference_keys_to_attend.is_empty());
    }

    #[tokio::test]
    async fn failed_registration_leaves_state_unchanged() {
        let store = store_with_attendee().await;
        let conference = store
            .insert_conference(new_conference("organizer", "Full", 0))
            .await
            .unwrap();

        let error = store.register("attendee", conference.id).await.unwrap_err();
        assert!(matches!(error, DatabaseError::Conflict(_)));
        assert_eq!(
            store.conference(conference.id).await.unwrap().unwrap(),
            conference
        );
        assert!(store
            .profile("attendee")
            .await
            .unwrap()
            .unwrap()
            .conference_keys_to_attend
            .is_empty());
    }

    #[tokio::test]
    async fn register_for_missing_conference_is_not_found() {
        let store = store_with_attendee().await;
        assert!(matches!(
            store.register("attendee", 42).await,
            Err(DatabaseError::NotFound {
                kind: "conference",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn only_the_organizer_updates() {
        let store = MemoryStore::new();
        let conference = store
            .insert_conference(new_conference("organizer", "DevCon", 10))
            .await
            .unwrap();
        let update = ConferenceUpdate {
            city: Some("Berlin".to_owned()),
            ..ConferenceUpdate::default()
        };

        assert!(matches!(
            store
                .update_conference("intruder", conference.id, update.clone())
                .await,
            Err(DatabaseError::Forbidden(_))
        ));
        let updated = store
            .update_conference("organizer", conference.id, update)
            .await
            .unwrap();
        assert_eq!(updated.city, "Berlin");
    }

    #[tokio::test]
    async fn nearly_sold_out_needs_one_to_five_seats() {
        let store = MemoryStore::new();
        for (name, seats) in [("Empty", 0), ("Tight", 5), ("Last", 1), ("Roomy", 6)] {
            store
                .insert_conference(new_conference("organizer", name, seats))
                .await
                .unwrap();
        }
        assert_eq!(
            store.nearly_sold_out_conferences().await.unwrap(),
            vec!["Tight".to_owned(), "Last".to_owned()]
        );
    }

    #[tokio::test]
    async fn session_queries() {
        let store = MemoryStore::new();
        let conference = store
            .insert_conference(new_conference("organizer", "DevCon", 10))
            .await
            .unwrap();
        let other = store
            .insert_conference(new_conference("organizer", "OtherCon", 10))
            .await
            .unwrap();
        store
            .insert_session(new_session(conference.id, "Ada", "workshop", (10, 0)))
            .await
            .unwrap();
        store
            .insert_session(new_session(conference.id, "Ada", "keynote", (20, 0)))
            .await
            .unwrap();
        store
            .insert_session(new_session(other.id, "Ada", "lecture", (9, 0)))
            .await
            .unwrap();
        store
            .insert_session(new_session(conference.id, "Grace", "lecture", (11, 0)))
            .await
            .unwrap();

        let by_speaker_in_conference = SessionQuery {
            speaker: Some("Ada".to_owned()),
            ..SessionQuery::in_conference(conference.id)
        };
        assert_eq!(store.count_sessions(&by_speaker_in_conference).await.unwrap(), 2);

        let not_workshops_before_seven = SessionQuery {
            type_of_session_not: Some("workshop".to_owned()),
            starts_before: NaiveTime::from_hms_opt(19, 0, 0),
            order: SessionOrder::TypeThenStartTime,
            ..SessionQuery::default()
        };
        let names: Vec<String> = store
            .query_sessions(&not_workshops_before_seven)
            .await
            .unwrap()
            .into_iter()
            .map(|session| session.name)
            .collect();
        assert_eq!(names, vec!["Ada talks".to_owned(), "Grace talks".to_owned()]);

        let first_two_non_workshops = SessionQuery {
            type_of_session_not: Some("workshop".to_owned()),
            order: SessionOrder::TypeThenStartTime,
            limit: Some(2),
            ..SessionQuery::default()
        };
        let types: Vec<String> = store
            .query_sessions(&first_two_non_workshops)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|session| session.type_of_session)
            .collect();
        assert_eq!(types, vec!["keynote".to_owned(), "lecture".to_owned()]);
        assert_eq!(store.count_sessions(&first_two_non_workshops).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn wishlist_needs_existing_session() {
        let store = store_with_attendee().await;
        assert!(matches!(
            store.add_to_wishlist("attendee", 3).await,
            Err(DatabaseError::NotFound { kind: "session", .. })
        ));

        let conference = store
            .insert_conference(new_conference("organizer", "DevCon", 10))
            .await
            .unwrap();
        let session = store
            .insert_session(new_session(conference.id, "Ada", "workshop", (10, 0)))
            .await
            .unwrap();
        store.add_to_wishlist("attendee", session.id).await.unwrap();
        assert!(matches!(
            store.add_to_wishlist("attendee", session.id).await,
            Err(DatabaseError::Conflict(_))
        ));
        assert!(store.remove_from_wishlist("attendee", session.id).await.unwrap());
    }
}
