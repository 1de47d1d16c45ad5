use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            AppErr::Domain(DomainError::InvalidInput { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::RoomFull) => {
                ApiError::new(StatusCode::CONFLICT, "ROOM_FULL", "room is full")
            }
            AppErr::Domain(DomainError::AlreadyInRoom) => ApiError::new(
                StatusCode::CONFLICT,
                "MEMBERSHIP_EXISTS",
                "member already joined room",
            ),
            AppErr::Domain(DomainError::RoomAlreadyExists) => {
                ApiError::new(StatusCode::CONFLICT, "ROOM_EXISTS", "room already exists")
            }
            AppErr::Domain(DomainError::RoomNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found")
            }
            AppErr::Domain(DomainError::MemberNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND", "member not found")
            }
            AppErr::Domain(DomainError::MessageNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "message not found",
            ),
            AppErr::Unauthorized(message) => {
                ApiError::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED", message)
            }
            AppErr::Forbidden(message) => {
                ApiError::new(StatusCode::FORBIDDEN, "AUTHORIZATION_FAILED", message)
            }
            AppErr::JoinCodeExhausted => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "JOIN_CODE_EXHAUSTED",
                "could not allocate a join code, try again",
            ),
            AppErr::Hub(err) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "HUB_UNAVAILABLE",
                format!("realtime hub error: {}", err),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
