use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::user::UserSummary;

#[derive(Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user_id: Uuid,
	pub content: Option<String>,
	pub image_url: Option<String>,
	pub image_id: Option<String>,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub update_dt: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostLike {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user_id: Uuid,
	pub post_id: Uuid,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostSave {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user_id: Uuid,
	pub post_id: Uuid,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user_id: Uuid,
	pub post_id: Uuid,
	pub content: String,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub update_dt: DateTime<Utc>,
}

/// Comment with its author populated, as listed under a post.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
	#[serde(rename = "_id")]
	pub id: Uuid,
	pub user: UserSummary,
	pub post_id: Uuid,
	pub content: String,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub update_dt: DateTime<Utc>,
}

/// Result of a like/save toggle: which way it went and the record involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled<T> {
	Added(T),
	Removed(T),
}
