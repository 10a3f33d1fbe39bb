use conference_central_database::query::SessionQuery;
use conference_central_database::Store;
use tracing::info;

use crate::cache::{Cache, RECENT_ANNOUNCEMENTS, SPEAKER_ANNOUNCEMENTS};
use crate::error::AppError;

/// Publishes the nearly sold out conferences, or clears the announcement when
/// there are none. Returns the published text.
pub async fn cache_announcement(store: &dyn Store, cache: &dyn Cache) -> Result<String, AppError> {
    let names = store.nearly_sold_out_conferences().await?;
    if names.is_empty() {
        cache.delete(RECENT_ANNOUNCEMENTS);
        return Ok(String::new());
    }
    let announcement = format!(
        "Last chance to attend! The following conferences are nearly sold out: {}",
        names.join(", ")
    );
    cache.set(RECENT_ANNOUNCEMENTS, announcement.clone());
    Ok(announcement)
}

/// A speaker with more than one session in the conference becomes the featured
/// speaker. Anyone else clears the announcement.
pub async fn determine_featured_speaker(
    store: &dyn Store,
    cache: &dyn Cache,
    conference_id: i64,
    speaker: &str,
) -> Result<(), AppError> {
    let sessions = store
        .count_sessions(&SessionQuery {
            speaker: Some(speaker.to_owned()),
            ..SessionQuery::in_conference(conference_id)
        })
        .await?;
    if sessions > 1 {
        info!(conference_id, speaker, sessions, "featured speaker");
        cache.set(
            SPEAKER_ANNOUNCEMENTS,
            format!("Featured Speaker(s) are: {speaker}"),
        );
    } else {
        cache.delete(SPEAKER_ANNOUNCEMENTS);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use conference_central_database::models::{NewConference, NewSession, Profile};
    use conference_central_database::MemoryStore;

    use super::*;
    use crate::cache::MemoryCache;

    async fn conference(store: &MemoryStore, name: &str, seats: i32) -> i64 {
        store
            .insert_conference(NewConference {
                organizer_user_id: "organizer".to_owned(),
                name: name.to_owned(),
                description: None,
                topics: Vec::new(),
                city: "London".to_owned(),
                start_date: None,
                end_date: None,
                month: 0,
                max_attendees: 100,
                seats_available: seats,
            })
            .await
            .unwrap()
            .id
    }

    async fn session(store: &MemoryStore, conference_id: i64, speaker: &str) {
        store
            .insert_session(NewSession {
                conference_id,
                name: "Talk".to_owned(),
                highlights: Vec::new(),
                speaker: speaker.to_owned(),
                duration: None,
                type_of_session: None,
                session_date: None,
                start_time: None,
            })
            .await
            .unwrap();
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::default();
        store
            .insert_profile(Profile::new(
                "organizer".to_owned(),
                "Organizer".to_owned(),
                "organizer@example.com".to_owned(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn announcement_lists_nearly_sold_out_conferences() {
        let store = store().await;
        let cache = MemoryCache::default();
        conference(&store, "Full", 0).await;
        conference(&store, "Tight", 5).await;
        conference(&store, "Roomy", 6).await;
        conference(&store, "Last", 1).await;

        let announcement = cache_announcement(&store, &cache).await.unwrap();
        assert_eq!(
            announcement,
            "Last chance to attend! The following conferences are nearly sold out: Tight, Last"
        );
        assert_eq!(cache.get(RECENT_ANNOUNCEMENTS), Some(announcement));
    }

    #[tokio::test]
    async fn announcement_is_cleared_without_candidates() {
        let store = store().await;
        let cache = MemoryCache::default();
        cache.set(RECENT_ANNOUNCEMENTS, "stale".to_owned());
        conference(&store, "Roomy", 50).await;

        assert_eq!(cache_announcement(&store, &cache).await.unwrap(), "");
        assert_eq!(cache.get(RECENT_ANNOUNCEMENTS), None);
    }

    #[tokio::test]
    async fn speaker_is_featured_from_the_second_session() {
        let store = store().await;
        let cache = MemoryCache::default();
        let devcon = conference(&store, "DevCon", 10).await;
        let other = conference(&store, "Other", 10).await;

        session(&store, devcon, "Ada").await;
        session(&store, other, "Ada").await;
        determine_featured_speaker(&store, &cache, devcon, "Ada").await.unwrap();
        assert_eq!(cache.get(SPEAKER_ANNOUNCEMENTS), None);

        session(&store, devcon, "Ada").await;
        determine_featured_speaker(&store, &cache, devcon, "Ada").await.unwrap();
        assert_eq!(
            cache.get(SPEAKER_ANNOUNCEMENTS).as_deref(),
            Some("Featured Speaker(s) are: Ada")
        );

        session(&store, devcon, "Grace").await;
        determine_featured_speaker(&store, &cache, devcon, "Grace").await.unwrap();
        assert_eq!(cache.get(SPEAKER_ANNOUNCEMENTS), None);
    }
}
