use axum::{
	body::Bytes,
	extract::{Multipart, State},
	http::{header::SET_COOKIE, HeaderMap},
	middleware,
	response::{AppendHeaders, IntoResponse},
	routing::{delete, get, patch, post},
	Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
	common::{
		middleware_auth::{authorize, cleared_cookie, cookie_value, token_cookie, CurrentUser, ACCESS_COOKIE, REFRESH_COOKIE},
		request::{parse_body, parse_id, FormPayload},
	},
	dependencies::AppState,
	domain::user::{Follow, UserProfile, UserSummary},
	services::{
		account_handlers::{AccountHandler, Authenticated, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateUserRequest},
		auth::TokenPair,
		response::{ApiResponse, ServiceError, ServiceResult},
	},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
	user_id: String,
}

#[derive(Deserialize)]
struct SearchBody {
	query: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
	refresh_token: Option<String>,
}

fn with_token_cookies<T: serde::Serialize>(
	state: &AppState,
	tokens: &TokenPair,
	response: ApiResponse<T>,
) -> impl IntoResponse {
	(
		AppendHeaders([
			(SET_COOKIE, token_cookie(ACCESS_COOKIE, &tokens.access_token, state.tokens.access_max_age())),
			(SET_COOKIE, token_cookie(REFRESH_COOKIE, &tokens.refresh_token, state.tokens.refresh_max_age())),
		]),
		response,
	)
}

fn without_token_cookies<T: serde::Serialize>(response: ApiResponse<T>) -> impl IntoResponse {
	(
		AppendHeaders([(SET_COOKIE, cleared_cookie(ACCESS_COOKIE)), (SET_COOKIE, cleared_cookie(REFRESH_COOKIE))]),
		response,
	)
}

async fn register(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<UserSummary>> {
	let request: RegisterRequest = parse_body(body, &["username", "email", "password", "fullName"])?;
	AccountHandler::register(&state, request).await
}

async fn login(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<impl IntoResponse> {
	let request: LoginRequest = parse_body(body, &["email", "password"])?;
	let Authenticated { tokens, response } = AccountHandler::login(&state, request).await?;
	Ok(with_token_cookies(&state, &tokens, response))
}

async fn logout(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<impl IntoResponse> {
	let response = AccountHandler::logout(&state, &user).await?;
	Ok(without_token_cookies(response))
}

/// Refresh token from the JSON body, falling back to the `refreshToken` cookie.
async fn refresh(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> ServiceResult<impl IntoResponse> {
	let from_body = if body.is_empty() {
		RefreshBody::default()
	} else {
		serde_json::from_slice(&body).map_err(|err| ServiceError::BadRequest(format!("Malformed payload: {err}")))?
	};
	let token = from_body
		.refresh_token
		.filter(|token| !token.is_empty())
		.or_else(|| cookie_value(&headers, REFRESH_COOKIE))
		.ok_or_else(|| ServiceError::Unauthorized("Refresh token not found!".into()))?;

	let Authenticated { tokens, response } = AccountHandler::refresh(&state, &token).await?;
	Ok(with_token_cookies(&state, &tokens, response))
}

async fn current(Extension(user): Extension<CurrentUser>) -> ApiResponse<UserSummary> {
	AccountHandler::current(&user)
}

async fn update_user(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	multipart: Multipart,
) -> ServiceResult<ApiResponse<UserSummary>> {
	let mut form = FormPayload::read(multipart).await?;
	let request: UpdateUserRequest = form.parse(&[])?;
	AccountHandler::update(&state, &user, request, form.file.take()).await
}

async fn change_password(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<()>> {
	let request: ChangePasswordRequest = parse_body(body, &["oldPassword", "newPassword"])?;
	AccountHandler::change_password(&state, &user, request).await
}

async fn delete_user(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<impl IntoResponse> {
	let response = AccountHandler::delete(&state, &user).await?;
	Ok(without_token_cookies(response))
}

async fn profile(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<UserProfile>> {
	let body: UserIdBody = parse_body(body, &["userId"])?;
	AccountHandler::profile(&state, &user, parse_id(&body.user_id)?).await
}

async fn follow(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Follow>> {
	let body: UserIdBody = parse_body(body, &["userId"])?;
	AccountHandler::follow(&state, &user, parse_id(&body.user_id)?).await
}

async fn suggested(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
	AccountHandler::suggested(&state, &user).await
}

async fn following(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
	AccountHandler::following(&state, &user).await
}

async fn search(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
	let body: SearchBody = parse_body(body, &["query"])?;
	AccountHandler::search(&state, &body.query).await
}

pub fn user_routers(state: AppState) -> Router<AppState> {
	Router::new()
		.route("/logout", post(logout))
		.route("/current", get(current))
		.route("/update", patch(update_user))
		.route("/password", patch(change_password))
		.route("/delete", delete(delete_user))
		.route("/profile", post(profile))
		.route("/follow", post(follow))
		.route("/suggested", get(suggested))
		.route("/following", get(following))
		.route("/search", post(search))
		.route_layer(middleware::from_fn_with_state(state, authorize))
		.route("/register", post(register))
		.route("/login", post(login))
		.route("/refresh", post(refresh))
}
