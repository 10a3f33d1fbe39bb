//! Conference filters as they arrive from clients, compiled into a query every
//! [`Store`](crate::store::Store) can run.
//!
//! Range filters are only supported on a single field per query so that every
//! backend can serve the query from one index scan.

use core::cmp::Ordering;

use chrono::{NaiveDate, NaiveTime};

use crate::error::QueryError;
use crate::models::{Conference, Session};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    City,
    Topic,
    Month,
    MaxAttendees,
}

impl Field {
    fn from_public_name(name: &str) -> Option<Self> {
        match name {
            "CITY" => Some(Self::City),
            "TOPIC" => Some(Self::Topic),
            "MONTH" => Some(Self::Month),
            "MAX_ATTENDEES" => Some(Self::MaxAttendees),
            _ => None,
        }
    }

    /// Name of the stored property.
    #[must_use]
    pub const fn property(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Topic => "topics",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl Operator {
    fn from_public_name(name: &str) -> Option<Self> {
        match name {
            "EQ" => Some(Self::Eq),
            "GT" => Some(Self::Gt),
            "GTEQ" => Some(Self::Ge),
            "LT" => Some(Self::Lt),
            "LTEQ" => Some(Self::Le),
            "NE" => Some(Self::Ne),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Ne => "!=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Ne => ordering.is_ne(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Integer(i32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConferenceFilter {
    pub field: Field,
    pub operator: Operator,
    pub value: FilterValue,
}

impl ConferenceFilter {
    fn compare_text(&self, actual: &str) -> bool {
        match &self.value {
            FilterValue::Text(expected) => self.operator.accepts(actual.cmp(expected.as_str())),
            FilterValue::Integer(_) => false,
        }
    }

    fn compare_integer(&self, actual: i32) -> bool {
        match self.value {
            FilterValue::Integer(expected) => self.operator.accepts(actual.cmp(&expected)),
            FilterValue::Text(_) => false,
        }
    }

    /// Repeated properties like `topics` match when any element matches.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        match self.field {
            Field::City => self.compare_text(&conference.city),
            Field::Topic => conference
                .topics
                .iter()
                .any(|topic| self.compare_text(topic)),
            Field::Month => self.compare_integer(conference.month),
            Field::MaxAttendees => self.compare_integer(conference.max_attendees),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConferenceQuery {
    pub filters: Vec<ConferenceFilter>,
    /// Results are sorted by this field first, then by name.
    pub inequality_field: Option<Field>,
}

impl ConferenceQuery {
    /// Compiles `(field, operator, value)` triples using the public filter vocabulary.
    pub fn compile<'a>(
        filters: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> Result<Self, QueryError> {
        let mut query = Self::default();
        for (field, operator, value) in filters {
            let (Some(field), Some(operator)) = (
                Field::from_public_name(field),
                Operator::from_public_name(operator),
            ) else {
                return Err(QueryError::InvalidFieldOrOperator);
            };

            if operator.is_inequality() {
                match query.inequality_field {
                    Some(inequality_field) if inequality_field != field => {
                        return Err(QueryError::MultipleInequalityFields);
                    }
                    _ => query.inequality_field = Some(field),
                }
            }

            let value = match field {
                Field::City | Field::Topic => FilterValue::Text(value.to_owned()),
                Field::Month | Field::MaxAttendees => {
                    FilterValue::Integer(value.trim().parse().map_err(|_| {
                        QueryError::InvalidValue {
                            field: field.property(),
                            value: value.to_owned(),
                        }
                    })?)
                }
            };

            query.filters.push(ConferenceFilter {
                field,
                operator,
                value,
            });
        }
        Ok(query)
    }

    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        self.filters.iter().all(|filter| filter.matches(conference))
    }

    /// Result order: inequality field (if any), name, key.
    #[must_use]
    pub fn compare(&self, a: &Conference, b: &Conference) -> Ordering {
        let by_inequality_field = match self.inequality_field {
            None => Ordering::Equal,
            Some(Field::City) => a.city.cmp(&b.city),
            // whole list, element by element, as Postgres orders text[]
            Some(Field::Topic) => a.topics.cmp(&b.topics),
            Some(Field::Month) => a.month.cmp(&b.month),
            Some(Field::MaxAttendees) => a.max_attendees.cmp(&b.max_attendees),
        };
        by_inequality_field
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionOrder {
    #[default]
    Key,
    TypeThenStartTime,
}

/// Conjunction of the set predicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Ancestor restriction.
    pub conference_id: Option<i64>,
    pub speaker: Option<String>,
    pub type_of_session: Option<String>,
    pub type_of_session_not: Option<String>,
    pub session_date: Option<NaiveDate>,
    pub starts_after: Option<NaiveTime>,
    pub starts_before: Option<NaiveTime>,
    pub order: SessionOrder,
    pub limit: Option<i64>,
}

impl SessionQuery {
    #[must_use]
    pub fn in_conference(conference_id: i64) -> Self {
        Self {
            conference_id: Some(conference_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        self.conference_id
            .map_or(true, |id| session.conference_id == id)
            && self
                .speaker
                .as_ref()
                .map_or(true, |speaker| &session.speaker == speaker)
            && self
                .type_of_session
                .as_ref()
                .map_or(true, |kind| session.type_of_session.as_ref() == Some(kind))
            && self.type_of_session_not.as_ref().map_or(true, |kind| {
                session
                    .type_of_session
                    .as_ref()
                    .is_some_and(|actual| actual != kind)
            })
            && self
                .session_date
                .map_or(true, |date| session.session_date == Some(date))
            && self.starts_after.map_or(true, |after| {
                session.start_time.is_some_and(|start| start > after)
            })
            && self.starts_before.map_or(true, |before| {
                session.start_time.is_some_and(|start| start < before)
            })
    }

    #[must_use]
    pub fn compare(&self, a: &Session, b: &Session) -> Ordering {
        match self.order {
            SessionOrder::Key => a.id.cmp(&b.id),
            SessionOrder::TypeThenStartTime => a
                .type_of_session
                .cmp(&b.type_of_session)
                .then_with(|| a.start_time.cmp(&b.start_time))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}
