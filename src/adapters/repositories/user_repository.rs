use uuid::Uuid;

use super::{notification_repository::insert_notification, Repository};
use crate::{
	domain::{
		notification::NewNotification,
		post::entity::Toggled,
		user::{Follow, User, UserSummary},
	},
	services::response::ServiceError,
};

const USER_COLUMNS: &str =
	"id, username, email, full_name, avatar, avatar_id, banner, password_hash, refresh_token, create_dt, update_dt";
const SUMMARY_COLUMNS: &str = "u.id, u.username, u.email, u.full_name, u.avatar, u.banner, u.create_dt, u.update_dt";

#[derive(Clone, Debug)]
pub struct NewUser<'a> {
	pub username: &'a str,
	pub email: &'a str,
	pub full_name: &'a str,
	pub password_hash: &'a str,
}

/// Profile fields to change; `None` keeps the stored value.
#[derive(Clone, Debug, Default)]
pub struct UserChanges<'a> {
	pub username: Option<&'a str>,
	pub email: Option<&'a str>,
	pub full_name: Option<&'a str>,
	pub avatar: Option<&'a str>,
	pub avatar_id: Option<&'a str>,
}

impl Repository<User> {
	pub async fn get(
		&self,
		id: Uuid,
	) -> Result<Option<User>, ServiceError> {
		let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool().await)
			.await?;
		Ok(user)
	}

	pub async fn get_by_email(
		&self,
		email: &str,
	) -> Result<Option<User>, ServiceError> {
		let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
			.bind(email)
			.fetch_optional(&self.pool().await)
			.await?;
		Ok(user)
	}

	pub async fn exists_with(
		&self,
		username: &str,
		email: &str,
	) -> Result<bool, ServiceError> {
		let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)")
			.bind(username)
			.bind(email)
			.fetch_one(&self.pool().await)
			.await?;
		Ok(exists)
	}

	pub async fn add(
		&self,
		new: NewUser<'_>,
	) -> Result<User, ServiceError> {
		let user = sqlx::query_as::<_, User>(&format!(
			r#"
			INSERT INTO users (id, username, email, full_name, password_hash)
			VALUES ($1, $2, $3, $4, $5)
			RETURNING {USER_COLUMNS}
			"#
		))
		.bind(Uuid::new_v4())
		.bind(new.username)
		.bind(new.email)
		.bind(new.full_name)
		.bind(new.password_hash)
		.fetch_one(&self.pool().await)
		.await?;
		Ok(user)
	}

	pub async fn set_refresh_token(
		&self,
		id: Uuid,
		refresh_token: Option<&str>,
	) -> Result<(), ServiceError> {
		sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
			.bind(id)
			.bind(refresh_token)
			.execute(&self.pool().await)
			.await?;
		Ok(())
	}

	pub async fn set_password_hash(
		&self,
		id: Uuid,
		password_hash: &str,
	) -> Result<(), ServiceError> {
		sqlx::query("UPDATE users SET password_hash = $2, update_dt = NOW() WHERE id = $1")
			.bind(id)
			.bind(password_hash)
			.execute(&self.pool().await)
			.await?;
		Ok(())
	}

	pub async fn update(
		&self,
		id: Uuid,
		changes: UserChanges<'_>,
	) -> Result<Option<User>, ServiceError> {
		let user = sqlx::query_as::<_, User>(&format!(
			r#"
			UPDATE users
			SET username = COALESCE($2, username),
			    email = COALESCE($3, email),
			    full_name = COALESCE($4, full_name),
			    avatar = COALESCE($5, avatar),
			    avatar_id = COALESCE($6, avatar_id),
			    update_dt = NOW()
			WHERE id = $1
			RETURNING {USER_COLUMNS}
			"#
		))
		.bind(id)
		.bind(changes.username)
		.bind(changes.email)
		.bind(changes.full_name)
		.bind(changes.avatar)
		.bind(changes.avatar_id)
		.fetch_optional(&self.pool().await)
		.await?;
		Ok(user)
	}

	/// Removes the account; everything it owns goes with it through the foreign keys.
	pub async fn delete(
		&self,
		id: Uuid,
	) -> Result<Option<User>, ServiceError> {
		let user = sqlx::query_as::<_, User>(&format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"))
			.bind(id)
			.fetch_optional(&self.pool().await)
			.await?;
		Ok(user)
	}

	/// Follows `target_id`, or unfollows if already following. A new follow notifies the target.
	pub async fn toggle_follow(
		&self,
		user_id: Uuid,
		target_id: Uuid,
	) -> Result<Toggled<Follow>, ServiceError> {
		let mut executor = self.executor.write().await;
		executor.begin().await?;

		let outcome = async {
			let trx = executor.transaction()?;
			let removed = sqlx::query_as::<_, Follow>(
				r#"
				DELETE FROM follows
				WHERE user_id = $1 AND following_id = $2
				RETURNING id, user_id, following_id, create_dt
				"#,
			)
			.bind(user_id)
			.bind(target_id)
			.fetch_optional(&mut **trx)
			.await?;
			if let Some(follow) = removed {
				return Ok(Toggled::Removed(follow));
			}

			let follow = sqlx::query_as::<_, Follow>(
				r#"
				INSERT INTO follows (id, user_id, following_id)
				VALUES ($1, $2, $3)
				RETURNING id, user_id, following_id, create_dt
				"#,
			)
			.bind(Uuid::new_v4())
			.bind(user_id)
			.bind(target_id)
			.fetch_one(&mut **trx)
			.await?;

			insert_notification(&mut **trx, &NewNotification::follow(user_id, target_id)).await?;
			Ok::<_, ServiceError>(Toggled::Added(follow))
		}
		.await;

		executor.finish(outcome).await
	}

	pub async fn is_following(
		&self,
		user_id: Uuid,
		target_id: Uuid,
	) -> Result<bool, ServiceError> {
		let exists: bool =
			sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND following_id = $2)")
				.bind(user_id)
				.bind(target_id)
				.fetch_one(&self.pool().await)
				.await?;
		Ok(exists)
	}

	pub async fn followers_count(
		&self,
		id: Uuid,
	) -> Result<i64, ServiceError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
			.bind(id)
			.fetch_one(&self.pool().await)
			.await?;
		Ok(count)
	}

	pub async fn following_count(
		&self,
		id: Uuid,
	) -> Result<i64, ServiceError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = $1")
			.bind(id)
			.fetch_one(&self.pool().await)
			.await?;
		Ok(count)
	}

	/// Users `id` follows, most recent follow first.
	pub async fn following(
		&self,
		id: Uuid,
	) -> Result<Vec<UserSummary>, ServiceError> {
		let users = sqlx::query_as::<_, UserSummary>(&format!(
			r#"
			SELECT {SUMMARY_COLUMNS}
			FROM follows f
			JOIN users u ON u.id = f.following_id
			WHERE f.user_id = $1
			ORDER BY f.create_dt DESC
			"#
		))
		.bind(id)
		.fetch_all(&self.pool().await)
		.await?;
		Ok(users)
	}

	/// Newest users that `id` does not follow yet, excluding `id` itself.
	pub async fn suggested(
		&self,
		id: Uuid,
		limit: i64,
	) -> Result<Vec<UserSummary>, ServiceError> {
		let users = sqlx::query_as::<_, UserSummary>(&format!(
			r#"
			SELECT {SUMMARY_COLUMNS}
			FROM users u
			WHERE u.id <> $1
			  AND NOT EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.following_id = u.id)
			ORDER BY u.create_dt DESC
			LIMIT $2
			"#
		))
		.bind(id)
		.bind(limit)
		.fetch_all(&self.pool().await)
		.await?;
		Ok(users)
	}

	/// Case-insensitive substring match on username or full name.
	pub async fn search(
		&self,
		query: &str,
		limit: i64,
	) -> Result<Vec<UserSummary>, ServiceError> {
		let pattern = format!("%{}%", escape_like(query));
		let users = sqlx::query_as::<_, UserSummary>(&format!(
			r#"
			SELECT {SUMMARY_COLUMNS}
			FROM users u
			WHERE u.username ILIKE $1 OR u.full_name ILIKE $1
			ORDER BY u.username
			LIMIT $2
			"#
		))
		.bind(pattern)
		.bind(limit)
		.fetch_all(&self.pool().await)
		.await?;
		Ok(users)
	}
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());
	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			escaped.push('\\');
		}
		escaped.push(ch);
	}
	escaped
}
