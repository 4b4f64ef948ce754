use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{
        AccessToken, ChangePasswordRequest, EmailRequest, LoginRequest, RegisterProviderRequest,
        RegisterRequest, TokenPair, UpdateUserRequest, UserResponse, VerifyQuery,
    },
    repo_types::User,
    services::Upload,
};
use crate::{
    auth::{extractors::MSG_INVALID_TOKEN, AuthUser, RefreshUser, Role},
    rest::{
        self, ApiError, ApiResponse, ValidatedJson, MSG_INVALID_ARGUMENTS, MSG_UNSUPPORTED_MEDIA,
    },
    state::UserState,
};

pub const MSG_NO_FILE: &str = "No file provided";
pub const MSG_TOO_MANY_FILES: &str = "Too many files";

const PICTURE_FIELD: &str = "image";
const PICTURE_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Roles that may act on users other than themselves.
const MANAGER_ROLES: &[Role] = &[Role::Admin];

type Reply<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn auth_routes() -> Router<UserState> {
    Router::new()
        .route("/auth/register/customer", post(register_customer))
        .route("/auth/register/provider", post(register_provider))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify", get(verify))
        .route("/auth/resend-confirmation", post(resend_confirmation))
}

pub fn user_routes() -> Router<UserState> {
    Router::new()
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route(
            "/users/:id/picture",
            patch(update_picture).layer(DefaultBodyLimit::max(PICTURE_BODY_LIMIT)),
        )
        .route("/users/:id/password", patch(change_password))
}

async fn to_response(state: &UserState, user: User) -> Result<UserResponse, ApiError> {
    let picture_url = state.users.picture_url(&user).await?;
    Ok(UserResponse::new(user, picture_url))
}

// --- auth ---

#[instrument(skip(state, body))]
pub async fn register_customer(
    State(state): State<UserState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state.auth.register_customer(body).await?;
    Ok(rest::created(UserResponse::new(user, None)))
}

#[instrument(skip(state, body))]
pub async fn register_provider(
    State(state): State<UserState>,
    ValidatedJson(body): ValidatedJson<RegisterProviderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state
        .auth
        .register_provider(body.user, &body.personal_id_number)
        .await?;
    Ok(rest::created(UserResponse::new(user, None)))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<UserState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Reply<TokenPair> {
    let pair = state.auth.login(&body.email, &body.password).await?;
    Ok(rest::ok(pair))
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<UserState>,
    RefreshUser(user_id): RefreshUser,
) -> Reply<AccessToken> {
    let access_token = state.auth.refresh(user_id).await?;
    Ok(rest::ok(AccessToken { access_token }))
}

#[instrument(skip(state, query))]
pub async fn verify(
    State(state): State<UserState>,
    Query(query): Query<VerifyQuery>,
) -> Reply<UserResponse> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized(MSG_INVALID_TOKEN))?;
    let user = state.auth.verify_email(&token).await?;
    Ok(rest::ok(to_response(&state, user).await?))
}

#[instrument(skip(state, body))]
pub async fn resend_confirmation(
    State(state): State<UserState>,
    ValidatedJson(body): ValidatedJson<EmailRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth.resend_confirmation(&body.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- users ---

#[instrument(skip(state), fields(caller = caller.id))]
pub async fn get_user(
    State(state): State<UserState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Reply<UserResponse> {
    let id = caller.resolve_target(&id, MANAGER_ROLES)?;
    let user = state.users.get(id).await?;
    Ok(rest::ok(to_response(&state, user).await?))
}

#[instrument(skip(state, body), fields(caller = caller.id))]
pub async fn update_user(
    State(state): State<UserState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> Reply<UserResponse> {
    let id = caller.resolve_target(&id, MANAGER_ROLES)?;
    let user = state.users.update(id, body.into()).await?;
    Ok(rest::ok(to_response(&state, user).await?))
}

#[instrument(skip(state, multipart), fields(caller = caller.id))]
pub async fn update_picture(
    State(state): State<UserState>,
    caller: AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Reply<UserResponse> {
    let id = caller.resolve_target(&id, MANAGER_ROLES)?;
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "multipart rejected");
        ApiError::bad_request(MSG_UNSUPPORTED_MEDIA)
    })?;

    let mut uploads = Vec::new();
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            warn!(error = %e, "read multipart field failed");
            ApiError::bad_request(MSG_INVALID_ARGUMENTS)
        })?;
        let Some(field) = field else { break };
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let body = field.bytes().await.map_err(|e| {
            warn!(error = %e, "read picture body failed");
            ApiError::bad_request(MSG_INVALID_ARGUMENTS)
        })?;
        uploads.push(Upload { body, content_type });
    }

    let upload = match uploads.len() {
        0 => return Err(ApiError::bad_request(MSG_NO_FILE)),
        1 => uploads.remove(0),
        _ => return Err(ApiError::bad_request(MSG_TOO_MANY_FILES)),
    };

    let user = state.users.set_picture(id, upload).await?;
    Ok(rest::ok(to_response(&state, user).await?))
}

#[instrument(skip(state, body), fields(caller = caller.id))]
pub async fn change_password(
    State(state): State<UserState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let id = caller.resolve_target(&id, MANAGER_ROLES)?;
    state
        .users
        .change_password(id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(caller = caller.id))]
pub async fn delete_user(
    State(state): State<UserState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = caller.resolve_target(&id, MANAGER_ROLES)?;
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{auth::Role, state::UserState, testing, users};

    const BOUNDARY: &str = "X-PICTURE-BOUNDARY";

    fn app(state: &UserState) -> Router {
        users::router().with_state(state.clone())
    }

    async fn read(res: axum::response::Response) -> (StatusCode, Value) {
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn call(
        state: &UserState,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            req = req.header(header::AUTHORIZATION, bearer);
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app(state)
            .oneshot(req.body(body).expect("request"))
            .await
            .expect("response");
        read(res).await
    }

    fn registration(email: &str) -> Value {
        json!({
            "email": email,
            "phone_number": "995555123456",
            "first_name": "Jane",
            "last_name": "Doe",
            "password": "S3cure!pass",
        })
    }

    /// Registers a customer and returns its id and an access bearer.
    async fn signed_in(state: &UserState, email: &str) -> (String, String) {
        let (status, body) = call(
            state,
            Method::POST,
            "/auth/register/customer",
            None,
            Some(registration(email)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().expect("string id").to_string();

        let (status, body) = call(
            state,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": email, "password": "S3cure!pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().expect("token");
        (id, format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn register_then_fetch_me() {
        let (state, _kit) = UserState::fake();
        let (id, bearer) = signed_in(&state, "jane@example.com").await;

        let (status, body) = call(&state, Method::GET, "/users/me", Some(&bearer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());
        assert_eq!(body["data"]["role"], "CUSTOMER");
        assert_eq!(body["data"]["verified"], false);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (state, _kit) = UserState::fake();
        signed_in(&state, "jane@example.com").await;

        let (status, body) = call(
            &state,
            Method::POST,
            "/auth/register/customer",
            None,
            Some(registration("JANE@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _kit) = UserState::fake();
        signed_in(&state, "jane@example.com").await;

        let (status, body) = call(
            &state,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "Wr0ng!pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Email or Password is incorrect");
    }

    #[tokio::test]
    async fn other_users_are_forbidden_without_admin() {
        let (state, kit) = UserState::fake();
        let (_, jane) = signed_in(&state, "jane@example.com").await;
        let (nino_id, _) = signed_in(&state, "nino@example.com").await;

        let uri = format!("/users/{nino_id}");
        let (status, body) = call(&state, Method::GET, &uri, Some(&jane), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient rights");

        let admin = testing::bearer(&kit.keys, 1, Role::Admin, true);
        let (status, body) = call(&state, Method::GET, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "nino@example.com");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (state, _kit) = UserState::fake();
        let (status, body) = call(&state, Method::GET, "/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authorization header is missing");

        let (status, body) =
            call(&state, Method::GET, "/users/me", Some("Token abc"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Bearer token is missing");
    }

    #[tokio::test]
    async fn password_change_checks_old_password() {
        let (state, _kit) = UserState::fake();
        let (_, bearer) = signed_in(&state, "jane@example.com").await;

        let (status, body) = call(
            &state,
            Method::PATCH,
            "/users/me/password",
            Some(&bearer),
            Some(json!({"old_password": "Wr0ng!pass", "new_password": "N3w!passwd"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Password is incorrect");

        let (status, _) = call(
            &state,
            Method::PATCH,
            "/users/me/password",
            Some(&bearer),
            Some(json!({"old_password": "S3cure!pass", "new_password": "N3w!passwd"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn refresh_issues_access_token() {
        let (state, kit) = UserState::fake();
        let (id, _) = signed_in(&state, "jane@example.com").await;
        let refresh = kit
            .keys
            .sign_refresh(id.parse().expect("numeric id"))
            .expect("sign refresh");

        let (status, body) = call(
            &state,
            Method::POST,
            "/auth/refresh",
            Some(&format!("Bearer {refresh}")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let access = body["data"]["access_token"].as_str().expect("access token");
        assert!(kit.keys.verify_access(access).is_ok());
    }

    #[tokio::test]
    async fn verify_without_token_is_unauthorized() {
        let (state, _kit) = UserState::fake();
        let (status, body) = call(&state, Method::GET, "/auth/verify", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid token");
    }

    fn picture_part(name: &str, content_type: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"p\"\r\n\
             Content-Type: {content_type}\r\n\r\nfake-bytes\r\n"
        )
    }

    async fn upload(state: &UserState, bearer: &str, parts: &[String]) -> (StatusCode, Value) {
        let body = format!("{}--{BOUNDARY}--\r\n", parts.concat());
        let req = Request::builder()
            .method(Method::PATCH)
            .uri("/users/me/picture")
            .header(header::AUTHORIZATION, bearer)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        let res = app(state).oneshot(req).await.expect("response");
        read(res).await
    }

    #[tokio::test]
    async fn picture_upload_counts_image_parts() {
        let (state, kit) = UserState::fake();
        let (_, bearer) = signed_in(&state, "jane@example.com").await;

        let (status, body) = upload(&state, &bearer, &[picture_part("other", "image/png")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No file provided");

        let two = [
            picture_part("image", "image/png"),
            picture_part("image", "image/png"),
        ];
        let (status, body) = upload(&state, &bearer, &two).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Too many files");

        let (status, body) = upload(&state, &bearer, &[picture_part("image", "text/plain")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unsupported media type");

        let (status, body) = upload(&state, &bearer, &[picture_part("image", "image/png")]).await;
        assert_eq!(status, StatusCode::OK);
        let url = body["data"]["picture_url"].as_str().expect("picture url");
        let key = url.trim_start_matches("https://storage.test/");
        assert!(key.starts_with("pfp/") && key.ends_with(".png"));
        assert!(kit.storage.contains(key));
    }

    #[tokio::test]
    async fn delete_me_then_not_found() {
        let (state, _kit) = UserState::fake();
        let (_, bearer) = signed_in(&state, "jane@example.com").await;

        let (status, _) = call(&state, Method::DELETE, "/users/me", Some(&bearer), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&state, Method::GET, "/users/me", Some(&bearer), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }
}
