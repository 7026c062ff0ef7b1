use std::ops::Deref;

use serde::Serialize;
use uuid::Uuid;

use self::entity::Post;
use crate::domain::user::UserSummary;

pub mod entity;

/// Like/comment/save counts joined onto a post at query time. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCounts {
	pub likes_count: u64,
	pub comments_count: u64,
	pub saves_count: u64,
}

impl EngagementCounts {
	/// Counts come back from the store as signed integers; anything negative is clamped to zero.
	pub fn from_raw(
		likes: i64,
		comments: i64,
		saves: i64,
	) -> Self {
		Self {
			likes_count: likes.max(0) as u64,
			comments_count: comments.max(0) as u64,
			saves_count: saves.max(0) as u64,
		}
	}
}

/// A post with its owner summary and engagement counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostAggregate {
	#[serde(flatten)]
	pub(crate) post: Post,
	pub(crate) user: UserSummary,
	#[serde(flatten)]
	pub(crate) counts: EngagementCounts,
}

impl PostAggregate {
	pub fn new(
		post: Post,
		user: UserSummary,
		counts: EngagementCounts,
	) -> Self {
		Self { post, user, counts }
	}
	pub fn counts(&self) -> EngagementCounts {
		self.counts
	}
}

impl Deref for PostAggregate {
	type Target = Post;
	fn deref(&self) -> &Self::Target {
		&self.post
	}
}

/// Which posts an aggregated read selects. Unset criteria do not filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostFilter {
	pub post_ids: Option<Vec<Uuid>>,
	pub owner_id: Option<Uuid>,
	pub saved_by: Option<Uuid>,
	pub followed_by: Option<Uuid>,
}

impl PostFilter {
	pub fn all() -> Self {
		Self::default()
	}
	pub fn by_id(id: Uuid) -> Self {
		Self {
			post_ids: Some(vec![id]),
			..Default::default()
		}
	}
	pub fn by_owner(owner_id: Uuid) -> Self {
		Self {
			owner_id: Some(owner_id),
			..Default::default()
		}
	}
	pub fn saved_by(user_id: Uuid) -> Self {
		Self {
			saved_by: Some(user_id),
			..Default::default()
		}
	}
	pub fn followed_by(user_id: Uuid) -> Self {
		Self {
			followed_by: Some(user_id),
			..Default::default()
		}
	}

}
