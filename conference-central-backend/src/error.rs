use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::response::{IntoResponse, Response};
use axum::Json;
use conference_central_config::ConfigError;
use conference_central_database::error::{DatabaseError, QueryError};
use http::StatusCode;
use tracing::{debug, error};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Authorization required")]
    Unauthorized,
    #[error("Only the scheduler and the task queue may call this endpoint")]
    InternalOnly,
    #[error("{0}")]
    BadRequest(String),
    #[error("No route for {0}")]
    RouteNotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("{}", .0.body_text())]
    JsonRejection(#[from] JsonRejection),
    #[error("{}", .0.body_text())]
    FormRejection(#[from] FormRejection),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("webserver error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("task queue is closed")]
    TaskQueueClosed,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InternalOnly | Self::Database(DatabaseError::Forbidden(_)) => {
                StatusCode::FORBIDDEN
            }
            Self::BadRequest(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::JsonRejection(rejection) => malformed(rejection.status()),
            Self::FormRejection(rejection) => malformed(rejection.status()),
            Self::RouteNotFound(_) | Self::Database(DatabaseError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Database(DatabaseError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::Hyper(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::TaskQueueClosed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Bodies that parse but do not fit the form are plain bad requests.
fn malformed(status: StatusCode) -> StatusCode {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    }
}

/// Server errors are logged in full and answered with a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("request failed: {self}");
            "Internal server error".to_owned()
        } else {
            debug!("request rejected with {status}: {self}");
            self.to_string()
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}
