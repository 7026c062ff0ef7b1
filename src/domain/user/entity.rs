use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored account. Never serialized as is; see [`UserSummary`].
#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct User {
	pub id: Uuid,
	pub username: String,
	pub email: String,
	pub full_name: Option<String>,
	pub avatar: Option<String>,
	pub avatar_id: Option<String>,
	pub banner: Option<String>,
	pub password_hash: String,
	pub refresh_token: Option<String>,
	pub create_dt: DateTime<Utc>,
	pub update_dt: DateTime<Utc>,
}

/// Public shape of a user with credentials stripped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub username: String,
	pub email: String,
	pub full_name: Option<String>,
	pub avatar: Option<String>,
	pub banner: Option<String>,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub update_dt: DateTime<Utc>,
}

impl From<User> for UserSummary {
	fn from(value: User) -> Self {
		Self {
			id: value.id,
			username: value.username,
			email: value.email,
			full_name: value.full_name,
			avatar: value.avatar,
			banner: value.banner,
			create_dt: value.create_dt,
			update_dt: value.update_dt,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user_id: Uuid,
	pub following_id: Uuid,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
}

/// Profile view of another user as seen by the caller.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
	#[serde(flatten)]
	pub user: UserSummary,
	pub followers_count: i64,
	pub following_count: i64,
	pub posts_count: i64,
	pub is_following: bool,
}
