pub mod announcement;
pub mod conference;
pub mod profile;
pub mod session;
pub mod tasks;
pub mod wishlist;

use axum::extract::{FromRequest, Request};
use axum::routing::{delete, get, post};
use axum::{async_trait, middleware, Form, Json, Router};
use http::Uri;
use serde::de::DeserializeOwned;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::AppError;
use crate::{request_span, AppState};

/// JSON body whose rejections are answered like every other [`AppError`].
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

/// Urlencoded body, used by the task queue.
pub struct ApiForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_owned())
}

/// The public API below `/conference/v1`.
fn api() -> Router<AppState> {
    Router::new()
        .route("/conference/v1/conference", post(conference::create_conference))
        .route(
            "/conference/v1/conference/:key",
            get(conference::get_conference)
                .put(conference::update_conference)
                .post(conference::register_for_conference)
                .delete(conference::unregister_from_conference),
        )
        .route(
            "/conference/v1/getConferencesCreated",
            post(conference::get_conferences_created),
        )
        .route("/conference/v1/queryConferences", post(conference::query_conferences))
        .route("/conference/v1/filterPlayground", get(conference::filter_playground))
        .route(
            "/conference/v1/profile",
            get(profile::get_profile).post(profile::save_profile),
        )
        .route(
            "/conference/v1/conference/announcement/get",
            get(announcement::get_announcement),
        )
        .route(
            "/conference/v1/conferences/attending",
            get(conference::get_conferences_to_attend),
        )
        .route("/conference/v1/conference/session/:key", post(session::create_session))
        .route(
            "/conference/v1/conference/session/getConferenceSessions/:key",
            post(session::get_conference_sessions),
        )
        .route(
            "/conference/v1/conference/session/getConferenceSessionsByType/:key/:type_of_session",
            post(session::get_conference_sessions_by_type),
        )
        .route(
            "/conference/v1/conference/session/getSessionsBySpeaker/:speaker",
            post(session::get_sessions_by_speaker),
        )
        .route(
            "/conference/v1/conference/session/addSessionToWishlist/:key",
            post(wishlist::add_session_to_wishlist),
        )
        .route(
            "/conference/v1/conferences/session/wishlist",
            get(wishlist::get_sessions_in_wishlist),
        )
        .route(
            "/conference/v1/conferences/session/wishlist/deleteSessionInWishlist/:key",
            delete(wishlist::delete_session_in_wishlist),
        )
        .route(
            "/conference/v1/conference/session/announcement/get",
            get(announcement::get_featured_speaker),
        )
        .route("/conference/v1/conference/session/firstQuery", get(session::first_query))
        .route("/conference/v1/conference/session/secondQuery", get(session::second_query))
        .route(
            "/conference/v1/conference/session/challengeQuery",
            get(session::challenge_query),
        )
}

/// Endpoints of the scheduler and the task queue, guarded by
/// [`crate::identity::Internal`].
fn internal() -> Router<AppState> {
    Router::new()
        .route("/crons/set_announcement", get(announcement::set_announcement))
        .route("/tasks/send_confirmation_email", post(tasks::send_confirmation_email))
        .route(
            "/tasks/determine_featured_speaker",
            post(tasks::determine_featured_speaker),
        )
}

pub fn router(state: AppState) -> Router {
    api()
        .merge(internal())
        .fallback(route_not_found)
        .layer(middleware::from_fn(request_span))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
