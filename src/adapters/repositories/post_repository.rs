use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::{notification_repository::insert_notification, EngagementSource, Repository};
use crate::{
	domain::{
		notification::NewNotification,
		post::{
			entity::{Comment, CommentView, Post, PostLike, PostSave, Toggled},
			EngagementCounts, PostAggregate, PostFilter,
		},
		user::UserSummary,
	},
	services::response::ServiceError,
};

/// One row of the aggregated post read: post columns, owner columns with
/// credentials left out, and the three engagement counts.
#[derive(FromRow)]
struct EngagedPostRow {
	id: Uuid,
	user_id: Uuid,
	content: Option<String>,
	image_url: Option<String>,
	image_id: Option<String>,
	create_dt: DateTime<Utc>,
	update_dt: DateTime<Utc>,
	owner_username: String,
	owner_email: String,
	owner_full_name: Option<String>,
	owner_avatar: Option<String>,
	owner_banner: Option<String>,
	owner_create_dt: DateTime<Utc>,
	owner_update_dt: DateTime<Utc>,
	likes_count: i64,
	comments_count: i64,
	saves_count: i64,
}

impl From<EngagedPostRow> for PostAggregate {
	fn from(row: EngagedPostRow) -> Self {
		PostAggregate::new(
			Post {
				id: row.id,
				user_id: row.user_id,
				content: row.content,
				image_url: row.image_url,
				image_id: row.image_id,
				create_dt: row.create_dt,
				update_dt: row.update_dt,
			},
			UserSummary {
				id: row.user_id,
				username: row.owner_username,
				email: row.owner_email,
				full_name: row.owner_full_name,
				avatar: row.owner_avatar,
				banner: row.owner_banner,
				create_dt: row.owner_create_dt,
				update_dt: row.owner_update_dt,
			},
			EngagementCounts::from_raw(row.likes_count, row.comments_count, row.saves_count),
		)
	}
}

#[derive(FromRow)]
struct CommentRow {
	id: Uuid,
	post_id: Uuid,
	content: String,
	create_dt: DateTime<Utc>,
	update_dt: DateTime<Utc>,
	author_id: Uuid,
	author_username: String,
	author_email: String,
	author_full_name: Option<String>,
	author_avatar: Option<String>,
	author_banner: Option<String>,
	author_create_dt: DateTime<Utc>,
	author_update_dt: DateTime<Utc>,
}

impl From<CommentRow> for CommentView {
	fn from(row: CommentRow) -> Self {
		CommentView {
			id: row.id,
			user: UserSummary {
				id: row.author_id,
				username: row.author_username,
				email: row.author_email,
				full_name: row.author_full_name,
				avatar: row.author_avatar,
				banner: row.author_banner,
				create_dt: row.author_create_dt,
				update_dt: row.author_update_dt,
			},
			post_id: row.post_id,
			content: row.content,
			create_dt: row.create_dt,
			update_dt: row.update_dt,
		}
	}
}

/// Image fields written together: both set or both cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredImage {
	pub url: String,
	pub public_id: String,
}

#[async_trait]
impl EngagementSource for Repository<PostAggregate> {
	async fn engaged_posts(
		&self,
		filter: &PostFilter,
	) -> Result<Vec<PostAggregate>, ServiceError> {
		let rows = sqlx::query_as::<_, EngagedPostRow>(
			r#"
			SELECT p.id, p.user_id, p.content, p.image_url, p.image_id, p.create_dt, p.update_dt,
			       u.username AS owner_username, u.email AS owner_email, u.full_name AS owner_full_name,
			       u.avatar AS owner_avatar, u.banner AS owner_banner,
			       u.create_dt AS owner_create_dt, u.update_dt AS owner_update_dt,
			       (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
			       (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
			       (SELECT COUNT(*) FROM saves s WHERE s.post_id = p.id) AS saves_count
			FROM posts p
			JOIN users u ON u.id = p.user_id
			WHERE ($1::uuid[] IS NULL OR p.id = ANY($1))
			  AND ($2::uuid IS NULL OR p.user_id = $2)
			  AND ($3::uuid IS NULL OR EXISTS (
			        SELECT 1 FROM saves sv WHERE sv.post_id = p.id AND sv.user_id = $3))
			  AND ($4::uuid IS NULL OR EXISTS (
			        SELECT 1 FROM follows f WHERE f.following_id = p.user_id AND f.user_id = $4))
			ORDER BY p.create_dt DESC
			"#,
		)
		.bind(filter.post_ids.clone())
		.bind(filter.owner_id)
		.bind(filter.saved_by)
		.bind(filter.followed_by)
		.fetch_all(&self.pool().await)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}
}

impl Repository<PostAggregate> {
	pub async fn get(
		&self,
		id: Uuid,
	) -> Result<Option<Post>, ServiceError> {
		let post = sqlx::query_as::<_, Post>(
			r#"
			SELECT id, user_id, content, image_url, image_id, create_dt, update_dt
			FROM posts
			WHERE id = $1
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool().await)
		.await?;
		Ok(post)
	}

	pub async fn add(
		&self,
		user_id: Uuid,
		content: &str,
		image: Option<&StoredImage>,
	) -> Result<Post, ServiceError> {
		let post = sqlx::query_as::<_, Post>(
			r#"
			INSERT INTO posts (id, user_id, content, image_url, image_id)
			VALUES ($1, $2, $3, $4, $5)
			RETURNING id, user_id, content, image_url, image_id, create_dt, update_dt
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(user_id)
		.bind(content)
		.bind(image.map(|i| i.url.as_str()))
		.bind(image.map(|i| i.public_id.as_str()))
		.fetch_one(&self.pool().await)
		.await?;
		Ok(post)
	}

	/// Updates a post owned by `owner_id`. `None` fields keep their stored value.
	pub async fn update(
		&self,
		id: Uuid,
		owner_id: Uuid,
		content: Option<&str>,
		image: Option<&StoredImage>,
	) -> Result<Option<Post>, ServiceError> {
		let post = sqlx::query_as::<_, Post>(
			r#"
			UPDATE posts
			SET content = COALESCE($3, content),
			    image_url = COALESCE($4, image_url),
			    image_id = COALESCE($5, image_id),
			    update_dt = NOW()
			WHERE id = $1 AND user_id = $2
			RETURNING id, user_id, content, image_url, image_id, create_dt, update_dt
			"#,
		)
		.bind(id)
		.bind(owner_id)
		.bind(content)
		.bind(image.map(|i| i.url.as_str()))
		.bind(image.map(|i| i.public_id.as_str()))
		.fetch_optional(&self.pool().await)
		.await?;
		Ok(post)
	}

	/// Deletes a post owned by `owner_id`; its likes, comments, saves and notifications go with it
	/// through the foreign keys. Nothing is removed when the post does not exist or belongs to someone else.
	pub async fn delete(
		&self,
		id: Uuid,
		owner_id: Uuid,
	) -> Result<Post, ServiceError> {
		let mut executor = self.executor.write().await;
		executor.begin().await?;

		let outcome = async {
			let trx = executor.transaction()?;
			let post = sqlx::query_as::<_, Post>(
				r#"
				DELETE FROM posts
				WHERE id = $1 AND user_id = $2
				RETURNING id, user_id, content, image_url, image_id, create_dt, update_dt
				"#,
			)
			.bind(id)
			.bind(owner_id)
			.fetch_optional(&mut **trx)
			.await?;

			post.ok_or_else(|| ServiceError::NotFound("Could not delete this post!".into()))
		}
		.await;

		executor.finish(outcome).await
	}

	/// Likes the post, or takes the like back if `user_id` already liked it.
	/// A fresh like notifies the post owner in the same transaction.
	pub async fn toggle_like(
		&self,
		user_id: Uuid,
		post: &Post,
	) -> Result<Toggled<PostLike>, ServiceError> {
		let mut executor = self.executor.write().await;
		executor.begin().await?;

		let outcome = async {
			let trx = executor.transaction()?;
			let removed = sqlx::query_as::<_, PostLike>(
				r#"
				DELETE FROM likes
				WHERE user_id = $1 AND post_id = $2
				RETURNING id, user_id, post_id, create_dt
				"#,
			)
			.bind(user_id)
			.bind(post.id)
			.fetch_optional(&mut **trx)
			.await?;
			if let Some(like) = removed {
				return Ok(Toggled::Removed(like));
			}

			let like = sqlx::query_as::<_, PostLike>(
				r#"
				INSERT INTO likes (id, user_id, post_id)
				VALUES ($1, $2, $3)
				RETURNING id, user_id, post_id, create_dt
				"#,
			)
			.bind(Uuid::new_v4())
			.bind(user_id)
			.bind(post.id)
			.fetch_one(&mut **trx)
			.await?;

			insert_notification(&mut **trx, &NewNotification::like(user_id, post.user_id, post.id)).await?;
			Ok::<_, ServiceError>(Toggled::Added(like))
		}
		.await;

		executor.finish(outcome).await
	}

	/// Saves the post, or unsaves it if `user_id` already saved it.
	pub async fn toggle_save(
		&self,
		user_id: Uuid,
		post_id: Uuid,
	) -> Result<Toggled<PostSave>, ServiceError> {
		let pool = self.pool().await;
		let removed = sqlx::query_as::<_, PostSave>(
			r#"
			DELETE FROM saves
			WHERE user_id = $1 AND post_id = $2
			RETURNING id, user_id, post_id, create_dt
			"#,
		)
		.bind(user_id)
		.bind(post_id)
		.fetch_optional(&pool)
		.await?;
		if let Some(save) = removed {
			return Ok(Toggled::Removed(save));
		}

		let save = sqlx::query_as::<_, PostSave>(
			r#"
			INSERT INTO saves (id, user_id, post_id)
			VALUES ($1, $2, $3)
			RETURNING id, user_id, post_id, create_dt
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(user_id)
		.bind(post_id)
		.fetch_one(&pool)
		.await?;
		Ok(Toggled::Added(save))
	}

	/// Records a comment and notifies the post owner.
	pub async fn add_comment(
		&self,
		user_id: Uuid,
		post: &Post,
		content: &str,
	) -> Result<Comment, ServiceError> {
		let mut executor = self.executor.write().await;
		executor.begin().await?;

		let outcome = async {
			let trx = executor.transaction()?;
			let comment = sqlx::query_as::<_, Comment>(
				r#"
				INSERT INTO comments (id, user_id, post_id, content)
				VALUES ($1, $2, $3, $4)
				RETURNING id, user_id, post_id, content, create_dt, update_dt
				"#,
			)
			.bind(Uuid::new_v4())
			.bind(user_id)
			.bind(post.id)
			.bind(content)
			.fetch_one(&mut **trx)
			.await?;

			insert_notification(&mut **trx, &NewNotification::comment(user_id, post.user_id, post.id)).await?;
			Ok::<_, ServiceError>(comment)
		}
		.await;

		executor.finish(outcome).await
	}

	pub async fn comments(
		&self,
		post_id: Uuid,
	) -> Result<Vec<CommentView>, ServiceError> {
		let rows = sqlx::query_as::<_, CommentRow>(
			r#"
			SELECT c.id, c.post_id, c.content, c.create_dt, c.update_dt,
			       u.id AS author_id, u.username AS author_username, u.email AS author_email,
			       u.full_name AS author_full_name, u.avatar AS author_avatar, u.banner AS author_banner,
			       u.create_dt AS author_create_dt, u.update_dt AS author_update_dt
			FROM comments c
			JOIN users u ON u.id = c.user_id
			WHERE c.post_id = $1
			ORDER BY c.create_dt DESC
			"#,
		)
		.bind(post_id)
		.fetch_all(&self.pool().await)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn count_by_owner(
		&self,
		owner_id: Uuid,
	) -> Result<i64, ServiceError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = $1")
			.bind(owner_id)
			.fetch_one(&self.pool().await)
			.await?;
		Ok(count)
	}

	/// Image ids of every post owned by `owner_id`, for cleanup before the account goes.
	pub async fn image_ids_by_owner(
		&self,
		owner_id: Uuid,
	) -> Result<Vec<String>, ServiceError> {
		let ids: Vec<String> =
			sqlx::query_scalar("SELECT image_id FROM posts WHERE user_id = $1 AND image_id IS NOT NULL")
				.bind(owner_id)
				.fetch_all(&self.pool().await)
				.await?;
		Ok(ids)
	}
}

#[cfg(test)]
mod test {
	use chrono::{Duration, Utc};
	use uuid::Uuid;

	use super::EngagedPostRow;
	use crate::domain::post::PostAggregate;

	fn row(
		owner_id: Uuid,
		likes_count: i64,
		comments_count: i64,
		saves_count: i64,
	) -> EngagedPostRow {
		let created = Utc::now() - Duration::hours(3);
		let joined = created - Duration::days(30);
		EngagedPostRow {
			id: Uuid::new_v4(),
			user_id: owner_id,
			content: Some("first light".into()),
			image_url: Some("https://images.test/dawn.png".into()),
			image_id: Some("dawn".into()),
			create_dt: created,
			update_dt: created,
			owner_username: "migo".into(),
			owner_email: "migo@krust.dev".into(),
			owner_full_name: Some("Migo Kim".into()),
			owner_avatar: None,
			owner_banner: None,
			owner_create_dt: joined,
			owner_update_dt: joined,
			likes_count,
			comments_count,
			saves_count,
		}
	}

	#[test]
	fn test_engaged_row_maps_owner_and_counts() {
		'_given: {
			let owner_id = Uuid::new_v4();
			let row = row(owner_id, 7, 3, -2);
			let post_id = row.id;
			let joined = row.owner_create_dt;

			'_when: {
				let aggregate = PostAggregate::from(row);
				let value = serde_json::to_value(&aggregate).unwrap();

				'_then: {
					assert_eq!(aggregate.id, post_id);
					assert_eq!(aggregate.user_id, owner_id);
					assert_eq!(aggregate.counts().likes_count, 7);
					assert_eq!(aggregate.counts().comments_count, 3);
					assert_eq!(aggregate.counts().saves_count, 0);

					assert_eq!(value["_id"], post_id.to_string());
					assert_eq!(value["userId"], owner_id.to_string());
					assert_eq!(value["likesCount"], 7);
					assert_eq!(value["commentsCount"], 3);
					assert_eq!(value["savesCount"], 0);

					let user = &value["user"];
					assert_eq!(user["_id"], value["userId"]);
					assert_eq!(user["username"], "migo");
					assert_eq!(user["email"], "migo@krust.dev");
					assert_eq!(user["fullName"], "Migo Kim");
					assert_eq!(user["createdAt"], serde_json::to_value(joined).unwrap());
					for credential in ["password", "passwordHash", "refreshToken"] {
						assert!(user.get(credential).is_none(), "{credential} leaked");
						assert!(value.get(credential).is_none(), "{credential} leaked");
					}
				}
			}
		}
	}

	#[test]
	fn test_engaged_row_keeps_post_timestamps_apart_from_owner() {
		let row = row(Uuid::new_v4(), 0, 0, 0);
		let created = row.create_dt;
		let aggregate = PostAggregate::from(row);

		let value = serde_json::to_value(&aggregate).unwrap();
		assert_eq!(aggregate.create_dt, created);
		assert_eq!(value["createdAt"], serde_json::to_value(created).unwrap());
		assert_ne!(value["createdAt"], value["user"]["createdAt"]);
	}

	#[test]
	fn test_post_dependents_cascade_in_schema() {
		let schema = include_str!("../../../migrations/20240101000000_init.sql");
		let cascading = schema
			.lines()
			.filter(|line| line.contains("post_id") && line.contains("REFERENCES posts (id) ON DELETE CASCADE"))
			.count();
		// likes, comments, saves, notifications
		assert_eq!(cascading, 4);
	}
}
