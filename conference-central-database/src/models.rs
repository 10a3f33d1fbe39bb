use core::fmt;
use core::str::FromStr;

use chrono::{Datelike as _, NaiveDate, NaiveTime};
use diesel::prelude::*;

use crate::error::DatabaseError;
use crate::schema::{conferences, profiles, sessions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TeeShirtSize {
    #[default]
    NotSpecified,
    XsM,
    XsW,
    SM,
    SW,
    MM,
    MW,
    LM,
    LW,
    XlM,
    XlW,
    XxlM,
    XxlW,
    XxxlM,
    XxxlW,
}

impl TeeShirtSize {
    pub const ALL: [Self; 15] = [
        Self::NotSpecified,
        Self::XsM,
        Self::XsW,
        Self::SM,
        Self::SW,
        Self::MM,
        Self::MW,
        Self::LM,
        Self::LW,
        Self::XlM,
        Self::XlW,
        Self::XxlM,
        Self::XxlW,
        Self::XxxlM,
        Self::XxxlW,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotSpecified => "NOT_SPECIFIED",
            Self::XsM => "XS_M",
            Self::XsW => "XS_W",
            Self::SM => "S_M",
            Self::SW => "S_W",
            Self::MM => "M_M",
            Self::MW => "M_W",
            Self::LM => "L_M",
            Self::LW => "L_W",
            Self::XlM => "XL_M",
            Self::XlW => "XL_W",
            Self::XxlM => "XXL_M",
            Self::XxlW => "XXL_W",
            Self::XxxlM => "XXXL_M",
            Self::XxxlW => "XXXL_W",
        }
    }
}

impl fmt::Display for TeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownTeeShirtSize(pub String);

impl fmt::Display for UnknownTeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tee shirt size {:?}", self.0)
    }
}

impl FromStr for TeeShirtSize {
    type Err = UnknownTeeShirtSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| UnknownTeeShirtSize(s.to_owned()))
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub main_email: String,
    /// One of [`TeeShirtSize::as_str`].
    pub tee_shirt_size: String,
    pub conference_keys_to_attend: Vec<i64>,
    pub session_wishlist_keys: Vec<i64>,
}

impl Profile {
    #[must_use]
    pub fn new(user_id: String, display_name: String, main_email: String) -> Self {
        Self {
            user_id,
            display_name,
            main_email,
            tee_shirt_size: TeeShirtSize::NotSpecified.as_str().to_owned(),
            conference_keys_to_attend: Vec::new(),
            session_wishlist_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_attending(&self, conference_id: i64) -> bool {
        self.conference_keys_to_attend.contains(&conference_id)
    }

    /// Takes one seat of `conference` for this profile.
    pub fn register(&mut self, conference: &mut Conference) -> Result<(), DatabaseError> {
        if self.is_attending(conference.id) {
            return Err(DatabaseError::conflict(
                "You have already registered for this conference",
            ));
        }
        if conference.seats_available <= 0 {
            return Err(DatabaseError::conflict("There are no seats available."));
        }
        self.conference_keys_to_attend.push(conference.id);
        conference.seats_available -= 1;
        Ok(())
    }

    /// Gives the seat taken by [`Profile::register`] back.
    pub fn unregister(&mut self, conference: &mut Conference) -> Result<(), DatabaseError> {
        if !self.is_attending(conference.id) {
            return Err(DatabaseError::conflict(
                "You are not registered for this conference",
            ));
        }
        self.conference_keys_to_attend
            .retain(|&conference_id| conference_id != conference.id);
        conference.seats_available = (conference.seats_available + 1).min(conference.max_attendees);
        Ok(())
    }

    pub fn add_to_wishlist(&mut self, session_id: i64) -> Result<(), DatabaseError> {
        if self.session_wishlist_keys.contains(&session_id) {
            return Err(DatabaseError::conflict(
                "You have already added this session to your wishlist",
            ));
        }
        self.session_wishlist_keys.push(session_id);
        Ok(())
    }

    /// Returns whether the session was on the wishlist.
    pub fn remove_from_wishlist(&mut self, session_id: i64) -> bool {
        let before = self.session_wishlist_keys.len();
        self.session_wishlist_keys.retain(|&id| id != session_id);
        before != self.session_wishlist_keys.len()
    }
}

#[derive(Queryable, Selectable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = conferences)]
pub struct Conference {
    pub id: i64,
    pub organizer_user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub topics: Vec<String>,
    pub city: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub month: i32,
    pub max_attendees: i32,
    pub seats_available: i32,
}

#[must_use]
pub fn month_of(start_date: Option<NaiveDate>) -> i32 {
    start_date.map_or(0, |date| {
        #[allow(clippy::cast_possible_wrap, reason = "months are 1 to 12")]
        let month = date.month() as i32;
        month
    })
}

impl Conference {
    #[must_use]
    pub const fn registered_attendees(&self) -> i32 {
        self.max_attendees - self.seats_available
    }

    /// Copies every provided field. The number of registered attendees stays fixed
    /// when `max_attendees` changes.
    pub fn apply(&mut self, update: ConferenceUpdate) -> Result<(), DatabaseError> {
        if let Some(max_attendees) = update.max_attendees {
            let registered = self.registered_attendees();
            if max_attendees < registered {
                return Err(DatabaseError::conflict(format!(
                    "{registered} attendees are already registered, maxAttendees can't be lower"
                )));
            }
            self.max_attendees = max_attendees;
            self.seats_available = max_attendees - registered;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(topics) = update.topics {
            self.topics = topics;
        }
        if let Some(city) = update.city {
            self.city = city;
        }
        if let Some(start_date) = update.start_date {
            self.start_date = Some(start_date);
            self.month = month_of(self.start_date);
        }
        if let Some(end_date) = update.end_date {
            self.end_date = Some(end_date);
        }
        Ok(())
    }
}

#[derive(Insertable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = conferences)]
pub struct NewConference {
    pub organizer_user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub topics: Vec<String>,
    pub city: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub month: i32,
    pub max_attendees: i32,
    pub seats_available: i32,
}

impl NewConference {
    #[must_use]
    pub fn into_conference(self, id: i64) -> Conference {
        Conference {
            id,
            organizer_user_id: self.organizer_user_id,
            name: self.name,
            description: self.description,
            topics: self.topics,
            city: self.city,
            start_date: self.start_date,
            end_date: self.end_date,
            month: self.month,
            max_attendees: self.max_attendees,
            seats_available: self.seats_available,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConferenceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub topics: Option<Vec<String>>,
    pub city: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_attendees: Option<i32>,
}

#[derive(Queryable, Selectable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: i64,
    pub conference_id: i64,
    pub name: String,
    pub highlights: Vec<String>,
    pub speaker: String,
    pub duration: Option<NaiveTime>,
    pub type_of_session: Option<String>,
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}

#[derive(Insertable, Clone, Debug, PartialEq, Eq)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub conference_id: i64,
    pub name: String,
    pub highlights: Vec<String>,
    pub speaker: String,
    pub duration: Option<NaiveTime>,
    pub type_of_session: Option<String>,
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}

impl NewSession {
    #[must_use]
    pub fn into_session(self, id: i64) -> Session {
        Session {
            id,
            conference_id: self.conference_id,
            name: self.name,
            highlights: self.highlights,
            speaker: self.speaker,
            duration: self.duration,
            type_of_session: self.type_of_session,
            session_date: self.session_date,
            start_time: self.start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conference(max_attendees: i32) -> Conference {
        Conference {
            id: 1,
            organizer_user_id: "organizer".to_owned(),
            name: "DevCon".to_owned(),
            description: None,
            topics: vec!["Rust".to_owned()],
            city: "London".to_owned(),
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees,
            seats_available: max_attendees,
        }
    }

    fn profile() -> Profile {
        Profile::new(
            "attendee".to_owned(),
            "Attendee".to_owned(),
            "attendee@example.com".to_owned(),
        )
    }

    #[test]
    fn register_then_unregister_restores_seats() {
        let mut conference = conference(2);
        let mut profile = profile();

        profile.register(&mut conference).unwrap();
        assert_eq!(conference.seats_available, 1);
        assert_eq!(profile.conference_keys_to_attend, vec![1]);

        profile.unregister(&mut conference).unwrap();
        assert_eq!(conference.seats_available, 2);
        assert!(profile.conference_keys_to_attend.is_empty());
    }

    #[test]
    fn register_twice_is_a_conflict() {
        let mut conference = conference(5);
        let mut profile = profile();
        profile.register(&mut conference).unwrap();

        let error = profile.register(&mut conference).unwrap_err();
        assert!(matches!(error, DatabaseError::Conflict(_)));
        assert_eq!(conference.seats_available, 4);
        assert_eq!(profile.conference_keys_to_attend, vec![1]);
    }

    #[test]
    fn register_without_seats_changes_nothing() {
        let mut conference = conference(0);
        let mut profile = profile();

        let error = profile.register(&mut conference).unwrap_err();
        assert!(matches!(error, DatabaseError::Conflict(_)));
        assert_eq!(conference.seats_available, 0);
        assert!(profile.conference_keys_to_attend.is_empty());
    }

    #[test]
    fn unregister_when_not_registered_is_a_conflict() {
        let mut conference = conference(3);
        let mut profile = profile();
        assert!(matches!(
            profile.unregister(&mut conference),
            Err(DatabaseError::Conflict(_))
        ));
        assert_eq!(conference.seats_available, 3);
    }

    #[test]
    fn wishlist_entries_are_unique() {
        let mut profile = profile();
        profile.add_to_wishlist(7).unwrap();
        assert!(matches!(
            profile.add_to_wishlist(7),
            Err(DatabaseError::Conflict(_))
        ));
        assert!(profile.remove_from_wishlist(7));
        assert!(!profile.remove_from_wishlist(7));
    }

    #[test]
    fn update_keeps_registered_attendees() {
        let mut conference = conference(10);
        conference.seats_available = 7;

        conference
            .apply(ConferenceUpdate {
                max_attendees: Some(20),
                start_date: NaiveDate::from_ymd_opt(2015, 6, 1),
                ..ConferenceUpdate::default()
            })
            .unwrap();
        assert_eq!(conference.max_attendees, 20);
        assert_eq!(conference.seats_available, 17);
        assert_eq!(conference.month, 6);

        let error = conference
            .apply(ConferenceUpdate {
                max_attendees: Some(2),
                ..ConferenceUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(error, DatabaseError::Conflict(_)));
        assert_eq!(conference.max_attendees, 20);
    }

    #[test]
    fn tee_shirt_sizes_round_trip_through_their_names() {
        assert_eq!("XXL_W".parse(), Ok(TeeShirtSize::XxlW));
        assert_eq!(TeeShirtSize::default().as_str(), "NOT_SPECIFIED");
        assert!("XXXXL_M".parse::<TeeShirtSize>().is_err());
    }
}
