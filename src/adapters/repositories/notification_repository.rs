use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use super::Repository;
use crate::{
	domain::{
		notification::{NewNotification, Notification, NotificationKind, NotificationView},
		user::UserSummary,
	},
	services::response::ServiceError,
};

#[derive(FromRow)]
struct NotificationRow {
	id: Uuid,
	#[sqlx(try_from = "String")]
	kind: NotificationKind,
	seen: bool,
	recipient_id: Uuid,
	post_id: Option<Uuid>,
	create_dt: DateTime<Utc>,
	actor_id: Uuid,
	actor_username: String,
	actor_email: String,
	actor_full_name: Option<String>,
	actor_avatar: Option<String>,
	actor_banner: Option<String>,
	actor_create_dt: DateTime<Utc>,
	actor_update_dt: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationView {
	fn from(row: NotificationRow) -> Self {
		NotificationView {
			id: row.id,
			kind: row.kind,
			seen: row.seen,
			user: UserSummary {
				id: row.actor_id,
				username: row.actor_username,
				email: row.actor_email,
				full_name: row.actor_full_name,
				avatar: row.actor_avatar,
				banner: row.actor_banner,
				create_dt: row.actor_create_dt,
				update_dt: row.actor_update_dt,
			},
			recipient_id: row.recipient_id,
			post_id: row.post_id,
			create_dt: row.create_dt,
		}
	}
}

/// Writes a notification through whatever executor the caller holds, usually
/// the transaction that recorded the like, comment or follow.
pub(crate) async fn insert_notification<'e>(
	executor: impl PgExecutor<'e>,
	new: &NewNotification,
) -> Result<Notification, ServiceError> {
	let notification = sqlx::query_as::<_, Notification>(
		r#"
		INSERT INTO notifications (id, kind, actor_id, recipient_id, post_id)
		VALUES ($1, $2, $3, $4, $5)
		RETURNING id, kind, seen, actor_id, recipient_id, post_id, create_dt
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(new.kind.as_str())
	.bind(new.actor_id)
	.bind(new.recipient_id)
	.bind(new.post_id)
	.fetch_one(executor)
	.await?;

	Ok(notification)
}

impl Repository<Notification> {
	pub async fn list_for(
		&self,
		recipient_id: Uuid,
		limit: i64,
	) -> Result<Vec<NotificationView>, ServiceError> {
		let rows = sqlx::query_as::<_, NotificationRow>(
			r#"
			SELECT n.id, n.kind, n.seen, n.recipient_id, n.post_id, n.create_dt,
			       u.id AS actor_id, u.username AS actor_username, u.email AS actor_email,
			       u.full_name AS actor_full_name, u.avatar AS actor_avatar, u.banner AS actor_banner,
			       u.create_dt AS actor_create_dt, u.update_dt AS actor_update_dt
			FROM notifications n
			JOIN users u ON u.id = n.actor_id
			WHERE n.recipient_id = $1
			ORDER BY n.create_dt DESC
			LIMIT $2
			"#,
		)
		.bind(recipient_id)
		.bind(limit)
		.fetch_all(&self.pool().await)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// Marks every unseen notification of `recipient_id` as seen; returns how many changed.
	pub async fn mark_all_seen(
		&self,
		recipient_id: Uuid,
	) -> Result<u64, ServiceError> {
		let result = sqlx::query(
			r#"
			UPDATE notifications
			SET seen = TRUE
			WHERE recipient_id = $1 AND seen = FALSE
			"#,
		)
		.bind(recipient_id)
		.execute(&self.pool().await)
		.await?;

		Ok(result.rows_affected())
	}
}
