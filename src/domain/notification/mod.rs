use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::user::UserSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
	Like,
	Comment,
	Follow,
}

impl NotificationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Like => "LIKE",
			Self::Comment => "COMMENT",
			Self::Follow => "FOLLOW",
		}
	}
}

impl TryFrom<String> for NotificationKind {
	type Error = String;
	fn try_from(value: String) -> Result<Self, Self::Error> {
		match value.as_str() {
			"LIKE" => Ok(Self::Like),
			"COMMENT" => Ok(Self::Comment),
			"FOLLOW" => Ok(Self::Follow),
			_ => Err(format!("unknown notification kind `{value}`")),
		}
	}
}

/// `actor` did something that concerns `recipient`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	#[serde(rename = "_id")]
	pub id: Uuid,
	#[serde(rename = "type")]
	#[sqlx(try_from = "String")]
	pub kind: NotificationKind,
	pub seen: bool,
	pub actor_id: Uuid,
	pub recipient_id: Uuid,
	pub post_id: Option<Uuid>,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
}

/// Notification with the acting user populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
	#[serde(rename = "_id")]
	pub id: Uuid,
	#[serde(rename = "type")]
	pub kind: NotificationKind,
	pub seen: bool,
	pub user: UserSummary,
	pub recipient_id: Uuid,
	pub post_id: Option<Uuid>,
	#[serde(rename = "createdAt")]
	pub create_dt: DateTime<Utc>,
}

/// Input for a new notification; id, seen flag and timestamp are filled in by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNotification {
	pub kind: NotificationKind,
	pub actor_id: Uuid,
	pub recipient_id: Uuid,
	pub post_id: Option<Uuid>,
}

impl NewNotification {
	pub fn like(
		actor_id: Uuid,
		recipient_id: Uuid,
		post_id: Uuid,
	) -> Self {
		Self {
			kind: NotificationKind::Like,
			actor_id,
			recipient_id,
			post_id: Some(post_id),
		}
	}
	pub fn comment(
		actor_id: Uuid,
		recipient_id: Uuid,
		post_id: Uuid,
	) -> Self {
		Self {
			kind: NotificationKind::Comment,
			actor_id,
			recipient_id,
			post_id: Some(post_id),
		}
	}
	pub fn follow(
		actor_id: Uuid,
		recipient_id: Uuid,
	) -> Self {
		Self {
			kind: NotificationKind::Follow,
			actor_id,
			recipient_id,
			post_id: None,
		}
	}
}

/// Number of notifications returned by a listing.
pub const NOTIFICATION_PAGE_SIZE: i64 = 10;

#[test]
fn test_kind_representation() {
	assert_eq!(serde_json::to_string(&NotificationKind::Like).unwrap(), "\"LIKE\"");
	assert_eq!(serde_json::to_string(&NotificationKind::Follow).unwrap(), "\"FOLLOW\"");
	assert_eq!(serde_json::from_str::<NotificationKind>("\"COMMENT\"").unwrap(), NotificationKind::Comment);

	assert_eq!(NotificationKind::try_from("LIKE".to_string()), Ok(NotificationKind::Like));
	assert!(NotificationKind::try_from("POKE".to_string()).is_err());

	let follow = NewNotification::follow(Uuid::new_v4(), Uuid::new_v4());
	assert_eq!(follow.kind, NotificationKind::Follow);
	assert!(follow.post_id.is_none());
}
