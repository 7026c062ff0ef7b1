use std::ops::Deref;

use axum::extract::State;
use axum::headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt};
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::dependencies::AppState;
use crate::domain::user::User;
use crate::services::response::ServiceError;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The authenticated caller, attached to the request by [`authorize`].
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl Deref for CurrentUser {
	type Target = User;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Access token from the `accessToken` cookie, falling back to `Authorization: Bearer`.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
	cookie_value(headers, ACCESS_COOKIE).or_else(|| {
		headers
			.typed_get::<Authorization<Bearer>>()
			.map(|Authorization(bearer)| bearer.token().to_string())
	})
}

pub fn cookie_value(
	headers: &HeaderMap,
	name: &str,
) -> Option<String> {
	headers
		.typed_get::<Cookie>()
		.and_then(|cookie| cookie.get(name).map(str::to_string))
		.filter(|value| !value.is_empty())
}

pub async fn authorize<B>(
	State(state): State<AppState>,
	mut request: Request<B>,
	next: Next<B>,
) -> Result<Response, ServiceError> {
	let token = access_token(request.headers()).ok_or_else(|| ServiceError::Unauthorized("Access token not found!".into()))?;
	let claims = state.tokens.verify_access(&token)?;

	let user = state
		.repository::<User>()
		.get(claims.user_id)
		.await?
		.ok_or_else(|| ServiceError::Unauthorized("Access token invalid!".into()))?;

	tracing::debug!("authorized {} ({})", user.username, user.id);
	request.extensions_mut().insert(CurrentUser(user));
	Ok(next.run(request).await)
}

/// `Set-Cookie` value for an HttpOnly, Secure token cookie.
pub fn token_cookie(
	name: &str,
	value: &str,
	max_age_secs: i64,
) -> HeaderValue {
	let cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; Secure");
	HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` value that expires `name` immediately.
pub fn cleared_cookie(name: &str) -> HeaderValue {
	token_cookie(name, "", 0)
}

#[cfg(test)]
mod test {
	use axum::http::{header, HeaderMap, HeaderValue};

	use super::{access_token, cleared_cookie, cookie_value, token_cookie, ACCESS_COOKIE};

	#[test]
	fn test_cookie_preferred_over_bearer() {
		let mut headers = HeaderMap::new();
		headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; accessToken=from-cookie"));
		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

		assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
	}

	#[test]
	fn test_bearer_fallback() {
		let mut headers = HeaderMap::new();
		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
		assert_eq!(access_token(&headers).as_deref(), Some("from-header"));

		assert_eq!(access_token(&HeaderMap::new()), None);
	}

	#[test]
	fn test_empty_cookie_ignored() {
		let mut headers = HeaderMap::new();
		headers.insert(header::COOKIE, HeaderValue::from_static("accessToken="));
		assert_eq!(cookie_value(&headers, ACCESS_COOKIE), None);
	}

	#[test]
	fn test_cookie_attributes() {
		let set = token_cookie(ACCESS_COOKIE, "abc", 60);
		assert_eq!(set.to_str().unwrap(), "accessToken=abc; Path=/; Max-Age=60; HttpOnly; Secure");

		let cleared = cleared_cookie(ACCESS_COOKIE);
		assert!(cleared.to_str().unwrap().starts_with("accessToken=; Path=/; Max-Age=0"));
	}
}
