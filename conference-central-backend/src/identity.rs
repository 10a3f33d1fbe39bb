//! Typed access to the headers set by the identity-aware proxy in front of the
//! service, the token of internal callers and the request id.

use axum::async_trait;
use axum::extract::FromRequestParts;
use headers::{Header, HeaderMapExt as _, HeaderName, HeaderValue};
use http::request::Parts;
use http::HeaderMap;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng as _};

use crate::error::AppError;
use crate::AppState;

macro_rules! string_header {
    ($(#[$meta:meta])* $name:ident, $header_name:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name(pub String);

        impl Header for $name {
            fn name() -> &'static HeaderName {
                static NAME: HeaderName = HeaderName::from_static($header_name);
                &NAME
            }

            fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
            where
                I: Iterator<Item = &'i HeaderValue>,
            {
                let value = values.next().ok_or_else(headers::Error::invalid)?;
                if values.next().is_some() {
                    return Err(headers::Error::invalid());
                }
                let value = value.to_str().map_err(|_| headers::Error::invalid())?;
                if value.is_empty() {
                    return Err(headers::Error::invalid());
                }
                Ok(Self(value.to_owned()))
            }

            fn encode<E>(&self, values: &mut E)
            where
                E: Extend<HeaderValue>,
            {
                if let Ok(value) = HeaderValue::from_str(&self.0) {
                    values.extend(core::iter::once(value));
                }
            }
        }
    };
}

string_header!(XRequestId, "x-request-id");
string_header!(
    /// Stable id of the signed in user.
    XAuthenticatedUserId,
    "x-authenticated-user-id"
);
string_header!(XAuthenticatedUserEmail, "x-authenticated-user-email");
string_header!(XAuthenticatedUserNickname, "x-authenticated-user-nickname");
string_header!(
    /// Shared secret of the scheduler and the task queue.
    XInternalToken,
    "x-internal-token"
);

impl XRequestId {
    #[must_use]
    pub fn random() -> Self {
        Self(
            thread_rng()
                .sample_iter(&Alphanumeric)
                .take(30)
                .map(char::from)
                .collect(),
        )
    }

    /// The incoming id, or a fresh one.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers.typed_get::<Self>().unwrap_or_else(Self::random)
    }
}

/// Identity established by the proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub nickname: String,
}

impl User {
    /// `None` without a user id header. The nickname falls back to the local part
    /// of the email.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let XAuthenticatedUserId(id) = headers.typed_get()?;
        let email = headers
            .typed_get::<XAuthenticatedUserEmail>()
            .map(|email| email.0)
            .unwrap_or_default();
        let nickname = headers
            .typed_get::<XAuthenticatedUserNickname>()
            .map_or_else(
                || {
                    email
                        .split('@')
                        .next()
                        .filter(|local_part| !local_part.is_empty())
                        .unwrap_or(&id)
                        .to_owned()
                },
                |nickname| nickname.0,
            );
        Some(Self {
            id,
            email,
            nickname,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or(AppError::Unauthorized)
    }
}

/// Proof that the request came from the scheduler or the task queue. Without a
/// configured token nobody qualifies.
#[derive(Clone, Copy, Debug)]
pub struct Internal;

impl Internal {
    #[must_use]
    pub fn verify(headers: &HeaderMap, expected: Option<&str>) -> Option<Self> {
        let XInternalToken(token) = headers.typed_get()?;
        (Some(token.as_str()) == expected).then_some(Self)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Internal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Self::verify(&parts.headers, state.internal_token.as_deref())
            .ok_or(AppError::InternalOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for &(name, value) in pairs {
            headers.append(name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn user_needs_an_id() {
        assert_eq!(
            User::from_headers(&headers(&[("x-authenticated-user-email", "a@b.c")])),
            None
        );
        assert_eq!(
            User::from_headers(&headers(&[("x-authenticated-user-id", "")])),
            None
        );
    }

    #[test]
    fn nickname_defaults_to_email_local_part() {
        let user = User::from_headers(&headers(&[
            ("x-authenticated-user-id", "42"),
            ("x-authenticated-user-email", "ada@example.com"),
        ]))
        .unwrap();
        assert_eq!(user.nickname, "ada");

        let user = User::from_headers(&headers(&[
            ("x-authenticated-user-id", "42"),
            ("x-authenticated-user-email", "ada@example.com"),
            ("x-authenticated-user-nickname", "Countess"),
        ]))
        .unwrap();
        assert_eq!(user.nickname, "Countess");
    }

    #[test]
    fn internal_callers_need_the_configured_token() {
        let marked = headers(&[("x-internal-token", "s3cret")]);
        assert!(Internal::verify(&marked, Some("s3cret")).is_some());
        assert!(Internal::verify(&marked, Some("other")).is_none());
        assert!(Internal::verify(&marked, None).is_none());
        assert!(Internal::verify(&HeaderMap::new(), Some("s3cret")).is_none());
    }

    #[test]
    fn request_id_is_echoed_or_generated() {
        let echoed = XRequestId::from_headers(&headers(&[("x-request-id", "abc")]));
        assert_eq!(echoed, XRequestId("abc".to_owned()));

        let generated = XRequestId::from_headers(&HeaderMap::new());
        assert_eq!(generated.0.len(), 30);
        assert!(generated.0.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
