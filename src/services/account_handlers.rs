use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	adapters::{
		image_host::delete_best_effort,
		repositories::user_repository::{NewUser, UserChanges},
	},
	common::{middleware_auth::CurrentUser, request::UploadedFile},
	dependencies::AppState,
	domain::{
		post::{entity::Toggled, PostAggregate},
		user::{normalize_email, normalize_username, Follow, User, UserProfile, UserSummary},
	},
	services::auth::{hash_password, verify_password, TokenPair},
};

use super::{
	handlers::upload_image,
	response::{ApiResponse, ServiceError, ServiceResult},
};

pub const SUGGESTED_USERS_LIMIT: i64 = 10;
pub const SEARCH_USERS_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
	pub username: String,
	pub email: String,
	pub password: String,
	pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
	pub username: Option<String>,
	pub email: Option<String>,
	pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
	pub old_password: String,
	pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
	pub user: UserSummary,
	pub access_token: String,
}

/// Tokens to hand out as cookies next to the response body.
pub struct Authenticated<T: Serialize> {
	pub tokens: TokenPair,
	pub response: ApiResponse<T>,
}

pub struct AccountHandler;
impl AccountHandler {
	async fn issue_tokens(
		state: &AppState,
		user: &User,
	) -> ServiceResult<TokenPair> {
		let tokens = state.tokens.issue_pair(user)?;
		state
			.repository::<User>()
			.set_refresh_token(user.id, Some(&tokens.refresh_token))
			.await
			.map_err(|err| ServiceError::Internal(format!("Error occurred while generating tokens: {err}")))?;
		Ok(tokens)
	}

	pub async fn register(
		state: &AppState,
		request: RegisterRequest,
	) -> ServiceResult<ApiResponse<UserSummary>> {
		const TAKEN: &str = "User with same email or username already exists!";
		let username = normalize_username(&request.username);
		let email = normalize_email(&request.email);
		if username.is_empty() || email.is_empty() || request.password.is_empty() {
			return Err(ServiceError::BadRequest("Username, email and password must not be empty".into()));
		}

		let repository = state.repository::<User>();
		if repository.exists_with(&username, &email).await? {
			return Err(ServiceError::BadRequest(TAKEN.into()));
		}

		let password_hash = hash_password(&request.password)?;
		let user = repository
			.add(NewUser {
				username: &username,
				email: &email,
				full_name: request.full_name.trim(),
				password_hash: &password_hash,
			})
			.await
			.map_err(|err| err.on_conflict(TAKEN))?;

		tracing::info!("registered user {} ({})", user.username, user.id);
		Ok(ApiResponse::ok("User created successfully", user.into()))
	}

	pub async fn login(
		state: &AppState,
		request: LoginRequest,
	) -> ServiceResult<Authenticated<LoginData>> {
		let user = state
			.repository::<User>()
			.get_by_email(&normalize_email(&request.email))
			.await?
			.ok_or_else(|| ServiceError::BadRequest("User not found!".into()))?;

		if !verify_password(&request.password, &user.password_hash)? {
			return Err(ServiceError::BadRequest("Wrong password!".into()));
		}

		let tokens = Self::issue_tokens(state, &user).await?;
		let response = ApiResponse::ok(
			"User logged in successfully",
			LoginData {
				user: user.into(),
				access_token: tokens.access_token.clone(),
			},
		);
		Ok(Authenticated { tokens, response })
	}

	pub async fn logout(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<()>> {
		state.repository::<User>().set_refresh_token(user.id, None).await?;
		Ok(ApiResponse::ok("User logged out successfully", ()))
	}

	/// Trades a valid refresh token that matches the stored one for a new pair.
	pub async fn refresh(
		state: &AppState,
		refresh_token: &str,
	) -> ServiceResult<Authenticated<TokenPair>> {
		let claims = state.tokens.verify_refresh(refresh_token)?;
		let user = state
			.repository::<User>()
			.get(claims.user_id)
			.await?
			.ok_or_else(|| ServiceError::Unauthorized("Refresh token invalid or expired!".into()))?;

		if user.refresh_token.as_deref() != Some(refresh_token) {
			tracing::warn!("stale refresh token presented for {}", user.id);
			return Err(ServiceError::Unauthorized("Refresh token invalid or expired!".into()));
		}

		let tokens = Self::issue_tokens(state, &user).await?;
		let response = ApiResponse::ok("Access token refreshed", tokens.clone());
		Ok(Authenticated { tokens, response })
	}

	pub fn current(user: &CurrentUser) -> ApiResponse<UserSummary> {
		ApiResponse::ok("Current user retrieved successfully", user.0.clone().into())
	}

	pub async fn update(
		state: &AppState,
		user: &CurrentUser,
		request: UpdateUserRequest,
		avatar: Option<UploadedFile>,
	) -> ServiceResult<ApiResponse<UserSummary>> {
		const TAKEN: &str = "Username or email is already taken!";
		let username = request.username.as_deref().map(normalize_username).filter(|u| !u.is_empty());
		let email = request.email.as_deref().map(normalize_email).filter(|e| !e.is_empty());
		let full_name = request.full_name.as_deref().map(str::trim);

		let image = upload_image(state.image_host.as_ref(), avatar).await?;
		let updated = state
			.repository::<User>()
			.update(
				user.id,
				UserChanges {
					username: username.as_deref(),
					email: email.as_deref(),
					full_name,
					avatar: image.as_ref().map(|i| i.url.as_str()),
					avatar_id: image.as_ref().map(|i| i.public_id.as_str()),
				},
			)
			.await;

		let updated = match updated {
			Ok(Some(updated)) => updated,
			failed => {
				if let Some(image) = &image {
					delete_best_effort(state.image_host.as_ref(), &image.public_id).await;
				}
				return Err(match failed {
					Err(err) => err.on_conflict(TAKEN),
					_ => ServiceError::NotFound("User not found!".into()),
				});
			}
		};

		if let (Some(_), Some(old_avatar)) = (&image, &user.avatar_id) {
			delete_best_effort(state.image_host.as_ref(), old_avatar).await;
		}
		Ok(ApiResponse::ok("User updated successfully", updated.into()))
	}

	pub async fn change_password(
		state: &AppState,
		user: &CurrentUser,
		request: ChangePasswordRequest,
	) -> ServiceResult<ApiResponse<()>> {
		if !verify_password(&request.old_password, &user.password_hash)? {
			return Err(ServiceError::BadRequest("Wrong password!".into()));
		}
		if request.new_password.is_empty() {
			return Err(ServiceError::BadRequest("New password must not be empty".into()));
		}

		let password_hash = hash_password(&request.new_password)?;
		state.repository::<User>().set_password_hash(user.id, &password_hash).await?;
		Ok(ApiResponse::ok("Password changed successfully", ()))
	}

	/// Removes the account with everything it owns, then its images from the host.
	pub async fn delete(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<UserSummary>> {
		let image_ids = state.repository::<PostAggregate>().image_ids_by_owner(user.id).await?;
		let deleted = state
			.repository::<User>()
			.delete(user.id)
			.await?
			.ok_or_else(|| ServiceError::NotFound("User not found!".into()))?;

		for image_id in image_ids.iter().chain(deleted.avatar_id.iter()) {
			delete_best_effort(state.image_host.as_ref(), image_id).await;
		}
		tracing::info!("deleted user {} ({})", deleted.username, deleted.id);
		Ok(ApiResponse::ok("User deleted successfully", deleted.into()))
	}

	pub async fn profile(
		state: &AppState,
		user: &CurrentUser,
		target_id: Uuid,
	) -> ServiceResult<ApiResponse<UserProfile>> {
		let users = state.repository::<User>();
		let posts = state.repository::<PostAggregate>();

		let (target, followers_count, following_count, posts_count, is_following) = futures::try_join!(
			users.get(target_id),
			users.followers_count(target_id),
			users.following_count(target_id),
			posts.count_by_owner(target_id),
			users.is_following(user.id, target_id),
		)?;
		let target = target.ok_or_else(|| ServiceError::NotFound("User not found!".into()))?;

		Ok(ApiResponse::ok(
			"Successfully retrieved user profile",
			UserProfile {
				user: target.into(),
				followers_count,
				following_count,
				posts_count,
				is_following,
			},
		))
	}

	pub async fn follow(
		state: &AppState,
		user: &CurrentUser,
		target_id: Uuid,
	) -> ServiceResult<ApiResponse<Follow>> {
		if target_id == user.id {
			return Err(ServiceError::BadRequest("You cannot follow yourself!".into()));
		}
		let users = state.repository::<User>();
		users
			.get(target_id)
			.await?
			.ok_or_else(|| ServiceError::NotFound("User not found!".into()))?;

		Ok(match users.toggle_follow(user.id, target_id).await? {
			Toggled::Added(follow) => ApiResponse::ok("Successfully followed user!", follow),
			Toggled::Removed(follow) => ApiResponse::ok("Successfully unfollowed user!", follow),
		})
	}

	pub async fn suggested(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
		let users = state.repository::<User>().suggested(user.id, SUGGESTED_USERS_LIMIT).await?;
		Ok(ApiResponse::ok("Successfully retrieved suggested users", users))
	}

	pub async fn following(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
		let users = state.repository::<User>().following(user.id).await?;
		Ok(ApiResponse::ok("Successfully retrieved followed users", users))
	}

	pub async fn search(
		state: &AppState,
		query: &str,
	) -> ServiceResult<ApiResponse<Vec<UserSummary>>> {
		let query = query.trim();
		if query.is_empty() {
			return Ok(ApiResponse::ok("Successfully searched users", vec![]));
		}
		let users = state.repository::<User>().search(query, SEARCH_USERS_LIMIT).await?;
		Ok(ApiResponse::ok("Successfully searched users", users))
	}
}
