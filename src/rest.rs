use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use crate::validation::Validate;

pub const MSG_INTERNAL: &str = "Something went wrong";
pub const MSG_INVALID_ARGUMENTS: &str = "Invalid arguments";
pub const MSG_UNSUPPORTED_MEDIA: &str = "Unsupported media type";
pub const MSG_EMPTY_BODY: &str = "Empty body";
pub const MSG_INVALID_ID: &str = "Invalid id";

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse { data }))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(e) => {
                error!(error = ?e, "internal error");
                MSG_INTERNAL.to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            message,
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// JSON body that is rejected with the error envelope and validated after binding.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json_content = is_json(req.headers());
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "read request body failed");
            ApiError::bad_request(MSG_INVALID_ARGUMENTS)
        })?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request(MSG_EMPTY_BODY));
        }
        if !json_content {
            return Err(ApiError::bad_request(MSG_UNSUPPORTED_MEDIA));
        }
        let Json(value) = Json::<T>::from_bytes(&bytes).map_err(map_json_rejection)?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(essence) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
    else {
        return false;
    };
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    warn!(error = %rejection, "json body rejected");
    ApiError::bad_request(MSG_INVALID_ARGUMENTS)
}
