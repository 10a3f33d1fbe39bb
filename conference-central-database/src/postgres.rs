use std::collections::HashMap;

use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{
    AsyncConnection as _, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection as _,
};
use tracing::debug;

use crate::error::DatabaseError;
use crate::models::{Conference, ConferenceUpdate, NewConference, NewSession, Profile, Session};
use crate::query::{ConferenceQuery, Field, FilterValue, Operator, SessionOrder, SessionQuery};
use crate::schema::{conferences, profiles, sessions};
use crate::store::{Store, NEARLY_SOLD_OUT_SEATS};
use crate::Pool;

const SCHEMA: &str = include_str!("../schema.sql");

macro_rules! compare {
    ($statement:expr, $column:expr, $operator:expr, $value:expr) => {
        match $operator {
            Operator::Eq => $statement.filter($column.eq($value)),
            Operator::Ne => $statement.filter($column.ne($value)),
            Operator::Gt => $statement.filter($column.gt($value)),
            Operator::Ge => $statement.filter($column.ge($value)),
            Operator::Lt => $statement.filter($column.lt($value)),
            Operator::Le => $statement.filter($column.le($value)),
        }
    };
}

/// Conference filters without ordering. `topics` comparisons hold when any
/// element satisfies them.
fn filtered_conferences(query: &ConferenceQuery) -> conferences::BoxedQuery<'static, Pg> {
    let mut statement: conferences::BoxedQuery<'static, Pg> = conferences::table.into_boxed();
    for filter in &query.filters {
        statement = match (filter.field, &filter.value) {
            (Field::City, FilterValue::Text(value)) => {
                compare!(statement, conferences::city, filter.operator, value.clone())
            }
            (Field::Topic, FilterValue::Text(value)) => statement.filter(
                sql::<Bool>(&format!(
                    "EXISTS (SELECT 1 FROM unnest(conferences.topics) AS topic WHERE topic {} ",
                    filter.operator.sql()
                ))
                .bind::<Text, _>(value.clone())
                .sql(")"),
            ),
            (Field::Month, FilterValue::Integer(value)) => {
                compare!(statement, conferences::month, filter.operator, *value)
            }
            (Field::MaxAttendees, FilterValue::Integer(value)) => {
                compare!(statement, conferences::max_attendees, filter.operator, *value)
            }
            // ConferenceQuery::compile never pairs these
            (Field::City | Field::Topic, FilterValue::Integer(_))
            | (Field::Month | Field::MaxAttendees, FilterValue::Text(_)) => statement,
        };
    }
    statement
}

fn filtered_sessions(query: &SessionQuery) -> sessions::BoxedQuery<'static, Pg> {
    let mut statement: sessions::BoxedQuery<'static, Pg> = sessions::table.into_boxed();
    if let Some(conference_id) = query.conference_id {
        statement = statement.filter(sessions::conference_id.eq(conference_id));
    }
    if let Some(speaker) = &query.speaker {
        statement = statement.filter(sessions::speaker.eq(speaker.clone()));
    }
    if let Some(kind) = &query.type_of_session {
        statement = statement.filter(sessions::type_of_session.eq(kind.clone()));
    }
    if let Some(kind) = &query.type_of_session_not {
        statement = statement.filter(sessions::type_of_session.ne(kind.clone()));
    }
    if let Some(date) = query.session_date {
        statement = statement.filter(sessions::session_date.eq(date));
    }
    if let Some(after) = query.starts_after {
        statement = statement.filter(sessions::start_time.gt(after));
    }
    if let Some(before) = query.starts_before {
        statement = statement.filter(sessions::start_time.lt(before));
    }
    statement
}

fn in_key_order<K: Eq + core::hash::Hash, V>(
    keys: &[K],
    rows: Vec<V>,
    key_of: impl Fn(&V) -> K,
) -> Vec<V> {
    let mut by_key: HashMap<K, V> = rows.into_iter().map(|row| (key_of(&row), row)).collect();
    keys.iter().filter_map(|key| by_key.remove(key)).collect()
}

async fn lock_profile(
    connection: &mut AsyncPgConnection,
    user_id: &str,
) -> Result<Profile, DatabaseError> {
    profiles::table
        .find(user_id)
        .select(Profile::as_select())
        .for_update()
        .get_result(connection)
        .await
        .optional()?
        .ok_or_else(|| DatabaseError::not_found("profile", user_id))
}

async fn lock_conference(
    connection: &mut AsyncPgConnection,
    id: i64,
) -> Result<Conference, DatabaseError> {
    conferences::table
        .find(id)
        .select(Conference::as_select())
        .for_update()
        .get_result(connection)
        .await
        .optional()?
        .ok_or_else(|| DatabaseError::not_found("conference", id))
}

async fn save_profile_lists(
    connection: &mut AsyncPgConnection,
    profile: &Profile,
) -> Result<(), DatabaseError> {
    diesel::update(profiles::table.find(&profile.user_id))
        .set((
            profiles::conference_keys_to_attend.eq(profile.conference_keys_to_attend.clone()),
            profiles::session_wishlist_keys.eq(profile.session_wishlist_keys.clone()),
        ))
        .execute(connection)
        .await?;
    Ok(())
}

async fn save_conference(
    connection: &mut AsyncPgConnection,
    conference: &Conference,
) -> Result<(), DatabaseError> {
    diesel::update(conferences::table.find(conference.id))
        .set((
            conferences::name.eq(conference.name.clone()),
            conferences::description.eq(conference.description.clone()),
            conferences::topics.eq(conference.topics.clone()),
            conferences::city.eq(conference.city.clone()),
            conferences::start_date.eq(conference.start_date),
            conferences::end_date.eq(conference.end_date),
            conferences::month.eq(conference.month),
            conferences::max_attendees.eq(conference.max_attendees),
            conferences::seats_available.eq(conference.seats_available),
        ))
        .execute(connection)
        .await?;
    Ok(())
}

/// PostgreSQL backed store. Multi-entity changes lock their rows with
/// `SELECT ... FOR UPDATE` inside one transaction, profile before conference.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates missing tables and indexes.
    pub async fn apply_schema(&self) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        connection.batch_execute(SCHEMA).await?;
        debug!("database schema applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(profiles::table
            .find(user_id)
            .select(Profile::as_select())
            .get_result(&mut connection)
            .await
            .optional()?)
    }

    async fn profiles(&self, user_ids: &[String]) -> Result<Vec<Profile>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let rows = profiles::table
            .filter(profiles::user_id.eq_any(user_ids))
            .select(Profile::as_select())
            .load(&mut connection)
            .await?;
        Ok(in_key_order(user_ids, rows, |profile| profile.user_id.clone()))
    }

    async fn insert_profile(&self, profile: Profile) -> Result<Profile, DatabaseError> {
        let mut connection = self.pool.get().await?;
        diesel::insert_into(profiles::table)
            .values(&profile)
            .on_conflict(profiles::user_id)
            .do_nothing()
            .execute(&mut connection)
            .await?;
        Ok(profiles::table
            .find(&profile.user_id)
            .select(Profile::as_select())
            .get_result(&mut connection)
            .await?)
    }

    async fn update_profile_details(
        &self,
        user_id: &str,
        display_name: Option<String>,
        tee_shirt_size: Option<String>,
    ) -> Result<Profile, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let profile = if display_name.is_none() && tee_shirt_size.is_none() {
            profiles::table
                .find(user_id)
                .select(Profile::as_select())
                .get_result(&mut connection)
                .await
        } else {
            diesel::update(profiles::table.find(user_id))
                .set((
                    display_name.map(|value| profiles::display_name.eq(value)),
                    tee_shirt_size.map(|value| profiles::tee_shirt_size.eq(value)),
                ))
                .returning(Profile::as_returning())
                .get_result(&mut connection)
                .await
        };
        profile
            .optional()?
            .ok_or_else(|| DatabaseError::not_found("profile", user_id))
    }

    async fn insert_conference(
        &self,
        conference: NewConference,
    ) -> Result<Conference, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(diesel::insert_into(conferences::table)
            .values(&conference)
            .returning(Conference::as_returning())
            .get_result(&mut connection)
            .await?)
    }

    async fn conference(&self, id: i64) -> Result<Option<Conference>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(conferences::table
            .find(id)
            .select(Conference::as_select())
            .get_result(&mut connection)
            .await
            .optional()?)
    }

    async fn conferences(&self, ids: &[i64]) -> Result<Vec<Conference>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let rows = conferences::table
            .filter(conferences::id.eq_any(ids))
            .select(Conference::as_select())
            .load(&mut connection)
            .await?;
        Ok(in_key_order(ids, rows, |conference| conference.id))
    }

    async fn conferences_by_organizer(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conference>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(conferences::table
            .filter(conferences::organizer_user_id.eq(user_id))
            .order_by(conferences::id.asc())
            .select(Conference::as_select())
            .load(&mut connection)
            .await?)
    }

    async fn query_conferences(
        &self,
        query: &ConferenceQuery,
    ) -> Result<Vec<Conference>, DatabaseError> {
        let mut statement = filtered_conferences(query);
        statement = match query.inequality_field {
            None => statement.order_by(conferences::name.asc()),
            Some(Field::City) => statement
                .order_by(conferences::city.asc())
                .then_order_by(conferences::name.asc()),
            // array order, so it matches the in-memory comparison
            Some(Field::Topic) => statement
                .order_by(conferences::topics.asc())
                .then_order_by(conferences::name.asc()),
            Some(Field::Month) => statement
                .order_by(conferences::month.asc())
                .then_order_by(conferences::name.asc()),
            Some(Field::MaxAttendees) => statement
                .order_by(conferences::max_attendees.asc())
                .then_order_by(conferences::name.asc()),
        };
        let mut connection = self.pool.get().await?;
        Ok(statement
            .then_order_by(conferences::id.asc())
            .select(Conference::as_select())
            .load(&mut connection)
            .await?)
    }

    async fn nearly_sold_out_conferences(&self) -> Result<Vec<String>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(conferences::table
            .filter(conferences::seats_available.gt(0))
            .filter(conferences::seats_available.le(NEARLY_SOLD_OUT_SEATS))
            .order_by(conferences::id.asc())
            .select(conferences::name)
            .load(&mut connection)
            .await?)
    }

    async fn update_conference(
        &self,
        organizer_user_id: &str,
        id: i64,
        update: ConferenceUpdate,
    ) -> Result<Conference, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    let mut conference = lock_conference(connection, id).await?;
                    if conference.organizer_user_id != organizer_user_id {
                        return Err(DatabaseError::forbidden(
                            "Only the owner can update the conference.",
                        ));
                    }
                    conference.apply(update)?;
                    save_conference(connection, &conference).await?;
                    Ok(conference)
                }
                .scope_boxed()
            })
            .await
    }

    async fn register(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    let mut profile = lock_profile(connection, user_id).await?;
                    let mut conference = lock_conference(connection, conference_id).await?;
                    profile.register(&mut conference)?;
                    save_profile_lists(connection, &profile).await?;
                    save_conference(connection, &conference).await
                }
                .scope_boxed()
            })
            .await
    }

    async fn unregister(&self, user_id: &str, conference_id: i64) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    let mut profile = lock_profile(connection, user_id).await?;
                    let mut conference = lock_conference(connection, conference_id).await?;
                    profile.unregister(&mut conference)?;
                    save_profile_lists(connection, &profile).await?;
                    save_conference(connection, &conference).await
                }
                .scope_boxed()
            })
            .await
    }

    async fn insert_session(&self, session: NewSession) -> Result<Session, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(diesel::insert_into(sessions::table)
            .values(&session)
            .returning(Session::as_returning())
            .get_result(&mut connection)
            .await?)
    }

    async fn session(&self, id: i64) -> Result<Option<Session>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(sessions::table
            .find(id)
            .select(Session::as_select())
            .get_result(&mut connection)
            .await
            .optional()?)
    }

    async fn sessions(&self, ids: &[i64]) -> Result<Vec<Session>, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let rows = sessions::table
            .filter(sessions::id.eq_any(ids))
            .select(Session::as_select())
            .load(&mut connection)
            .await?;
        Ok(in_key_order(ids, rows, |session| session.id))
    }

    async fn query_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, DatabaseError> {
        let mut statement = filtered_sessions(query);
        statement = match query.order {
            SessionOrder::Key => statement.order_by(sessions::id.asc()),
            SessionOrder::TypeThenStartTime => statement
                .order_by(sessions::type_of_session.asc())
                .then_order_by(sessions::start_time.asc())
                .then_order_by(sessions::id.asc()),
        };
        if let Some(limit) = query.limit {
            statement = statement.limit(limit);
        }
        let mut connection = self.pool.get().await?;
        Ok(statement
            .select(Session::as_select())
            .load(&mut connection)
            .await?)
    }

    async fn count_sessions(&self, query: &SessionQuery) -> Result<i64, DatabaseError> {
        let mut connection = self.pool.get().await?;
        Ok(filtered_sessions(query)
            .count()
            .get_result(&mut connection)
            .await?)
    }

    async fn add_to_wishlist(&self, user_id: &str, session_id: i64) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    sessions::table
                        .find(session_id)
                        .select(sessions::id)
                        .get_result::<i64>(connection)
                        .await
                        .optional()?
                        .ok_or_else(|| DatabaseError::not_found("session", session_id))?;
                    let mut profile = lock_profile(connection, user_id).await?;
                    profile.add_to_wishlist(session_id)?;
                    save_profile_lists(connection, &profile).await
                }
                .scope_boxed()
            })
            .await
    }

    async fn remove_from_wishlist(
        &self,
        user_id: &str,
        session_id: i64,
    ) -> Result<bool, DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        connection
            .transaction::<_, DatabaseError, _>(|connection| {
                async move {
                    let mut profile = lock_profile(connection, user_id).await?;
                    let removed = profile.remove_from_wishlist(session_id);
                    if removed {
                        save_profile_lists(connection, &profile).await?;
                    }
                    Ok(removed)
                }
                .scope_boxed()
            })
            .await
    }
}
