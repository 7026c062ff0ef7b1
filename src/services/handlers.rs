use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
	adapters::{
		image_host::{delete_best_effort, ImageHost},
		repositories::{post_repository::StoredImage, EngagementSource},
	},
	common::{middleware_auth::CurrentUser, request::UploadedFile},
	dependencies::AppState,
	domain::{
		notification::{Notification, NotificationView, NOTIFICATION_PAGE_SIZE},
		post::{
			entity::{Comment, CommentView, Post, PostLike, PostSave, Toggled},
			PostAggregate, PostFilter,
		},
		trending::{self, ScoredPost},
	},
};

use super::response::{ApiResponse, ServiceError, ServiceResult};

/// Uploads `file` if there is one.
pub(crate) async fn upload_image(
	host: &dyn ImageHost,
	file: Option<UploadedFile>,
) -> ServiceResult<Option<StoredImage>> {
	let Some(file) = file else {
		return Ok(None);
	};
	let asset = host.upload(file.bytes, &file.file_name).await?;
	Ok(Some(StoredImage {
		url: asset.url,
		public_id: asset.public_id,
	}))
}

pub struct TrendingHandler;
impl TrendingHandler {
	/// Every post joined with its engagement, scored against `now` and ranked.
	/// A failed read fails the whole ranking.
	pub async fn trending_posts(
		source: &dyn EngagementSource,
		now: DateTime<Utc>,
	) -> ServiceResult<Vec<ScoredPost>> {
		let posts = source.engaged_posts(&PostFilter::all()).await.map_err(|err| {
			tracing::error!("Trending aggregation failed: {}", err);
			ServiceError::Internal("computation failed".into())
		})?;
		tracing::debug!("ranking {} posts", posts.len());
		Ok(trending::rank(posts, now))
	}
}

pub struct PostHandler;
impl PostHandler {
	pub async fn get_post(
		state: &AppState,
		post_id: Uuid,
	) -> ServiceResult<ApiResponse<PostAggregate>> {
		let post = state
			.repository::<PostAggregate>()
			.engaged_posts(&PostFilter::by_id(post_id))
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| ServiceError::NotFound("Post not found!".into()))?;
		Ok(ApiResponse::ok("Successfully retrieved post", post))
	}

	pub async fn create_post(
		state: &AppState,
		user: &CurrentUser,
		content: &str,
		file: Option<UploadedFile>,
	) -> ServiceResult<ApiResponse<Post>> {
		let image = upload_image(state.image_host.as_ref(), file).await?;
		let created = state.repository::<PostAggregate>().add(user.id, content, image.as_ref()).await;

		match created {
			Ok(post) => Ok(ApiResponse::ok("Post created successfully!", post)),
			Err(err) => {
				if let Some(image) = image {
					delete_best_effort(state.image_host.as_ref(), &image.public_id).await;
				}
				Err(err)
			}
		}
	}

	/// Only the owner may update. A new image replaces the old one, which is then removed from the host.
	pub async fn update_post(
		state: &AppState,
		user: &CurrentUser,
		post_id: Uuid,
		content: Option<&str>,
		file: Option<UploadedFile>,
	) -> ServiceResult<ApiResponse<Post>> {
		let repository = state.repository::<PostAggregate>();
		let existing = repository
			.get(post_id)
			.await?
			.filter(|post| post.user_id == user.id)
			.ok_or_else(|| ServiceError::NotFound("Post not found!".into()))?;

		let image = upload_image(state.image_host.as_ref(), file).await?;
		let updated = match repository.update(post_id, user.id, content, image.as_ref()).await {
			Ok(Some(post)) => post,
			failed => {
				if let Some(image) = &image {
					delete_best_effort(state.image_host.as_ref(), &image.public_id).await;
				}
				return Err(match failed {
					Err(err) => err,
					_ => ServiceError::NotFound("Post not found!".into()),
				});
			}
		};

		if let (Some(_), Some(old_image_id)) = (&image, &existing.image_id) {
			delete_best_effort(state.image_host.as_ref(), old_image_id).await;
		}
		Ok(ApiResponse::ok("Post updated successfully!", updated))
	}

	pub async fn delete_post(
		state: &AppState,
		user: &CurrentUser,
		post_id: Uuid,
	) -> ServiceResult<ApiResponse<Post>> {
		let deleted = state.repository::<PostAggregate>().delete(post_id, user.id).await?;
		if let Some(image_id) = &deleted.image_id {
			delete_best_effort(state.image_host.as_ref(), image_id).await;
		}
		Ok(ApiResponse::ok("Successfully deleted post!", deleted))
	}

	pub async fn all_posts(state: &AppState) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
		let posts = state.repository::<PostAggregate>().engaged_posts(&PostFilter::all()).await?;
		Ok(ApiResponse::ok("Successfully retrived all posts!", posts))
	}

	pub async fn trending_posts(state: &AppState) -> ServiceResult<ApiResponse<Vec<ScoredPost>>> {
		let repository = state.repository::<PostAggregate>();
		let ranked = TrendingHandler::trending_posts(&repository, Utc::now()).await?;
		Ok(ApiResponse::ok("Successfully retrieved trending posts", ranked))
	}

	pub async fn following_posts(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
		let posts = state
			.repository::<PostAggregate>()
			.engaged_posts(&PostFilter::followed_by(user.id))
			.await?;
		Ok(ApiResponse::ok("Successfully retrieved following posts", posts))
	}

	pub async fn user_posts(
		state: &AppState,
		owner_id: Uuid,
	) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
		let posts = state
			.repository::<PostAggregate>()
			.engaged_posts(&PostFilter::by_owner(owner_id))
			.await?;
		Ok(ApiResponse::ok("Successfully retrieved users posts", posts))
	}

	pub async fn user_saves(
		state: &AppState,
		user_id: Uuid,
	) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
		let posts = state
			.repository::<PostAggregate>()
			.engaged_posts(&PostFilter::saved_by(user_id))
			.await?;
		Ok(ApiResponse::ok("Successfully retrieved user saves", posts))
	}

	pub async fn like_post(
		state: &AppState,
		user: &CurrentUser,
		post_id: Uuid,
	) -> ServiceResult<ApiResponse<PostLike>> {
		let repository = state.repository::<PostAggregate>();
		let post = repository
			.get(post_id)
			.await?
			.ok_or_else(|| ServiceError::NotFound("Failed to like post! Reason: Post does not exist!".into()))?;

		Ok(match repository.toggle_like(user.id, &post).await? {
			Toggled::Added(like) => ApiResponse::ok("Successfully liked post!", like),
			Toggled::Removed(like) => ApiResponse::ok("Successfully unliked post!", like),
		})
	}

	pub async fn save_post(
		state: &AppState,
		user: &CurrentUser,
		post_id: Uuid,
	) -> ServiceResult<ApiResponse<PostSave>> {
		let repository = state.repository::<PostAggregate>();
		let post = repository
			.get(post_id)
			.await?
			.ok_or_else(|| ServiceError::NotFound("Failed to save post! Reason: Post does not exist!".into()))?;

		Ok(match repository.toggle_save(user.id, post.id).await? {
			Toggled::Added(save) => ApiResponse::ok("Successfully saved post!", save),
			Toggled::Removed(save) => ApiResponse::ok("Successfully unsaved post!", save),
		})
	}

	pub async fn comment(
		state: &AppState,
		user: &CurrentUser,
		post_id: Uuid,
		content: &str,
	) -> ServiceResult<ApiResponse<Comment>> {
		let repository = state.repository::<PostAggregate>();
		let post = repository
			.get(post_id)
			.await?
			.ok_or_else(|| ServiceError::NotFound("Failed to comment on post! Reason: Post does not exist!".into()))?;

		let comment = repository.add_comment(user.id, &post, content).await?;
		Ok(ApiResponse::ok("Successfully commented on post!", comment))
	}

	pub async fn comments(
		state: &AppState,
		post_id: Uuid,
	) -> ServiceResult<ApiResponse<Vec<CommentView>>> {
		let comments = state.repository::<PostAggregate>().comments(post_id).await?;
		Ok(ApiResponse::ok("Successfully retrieved all comments", comments))
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenUpdate {
	pub modified_count: u64,
}

pub struct NotificationHandler;
impl NotificationHandler {
	pub async fn all(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<Vec<NotificationView>>> {
		let notifications = state
			.repository::<Notification>()
			.list_for(user.id, NOTIFICATION_PAGE_SIZE)
			.await?;
		Ok(ApiResponse::ok("Successfully retrieved all notifications of users", notifications))
	}

	pub async fn mark_as_seen(
		state: &AppState,
		user: &CurrentUser,
	) -> ServiceResult<ApiResponse<SeenUpdate>> {
		let modified_count = state.repository::<Notification>().mark_all_seen(user.id).await?;
		Ok(ApiResponse::ok(
			"Successfully marked notifications as seen",
			SeenUpdate { modified_count },
		))
	}
}

pub struct PublicHandler;
impl PublicHandler {
	pub fn health() -> ApiResponse<serde_json::Value> {
		ApiResponse::ok("Server is up and running", json!({}))
	}
}

#[cfg(test)]
mod test {
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	use async_trait::async_trait;
	use bytes::Bytes;
	use chrono::{Duration, Utc};
	use uuid::Uuid;

	use super::{upload_image, PublicHandler, TrendingHandler};
	use crate::{
		adapters::{
			image_host::{ImageHost, UploadedAsset},
			repositories::EngagementSource,
		},
		common::request::UploadedFile,
		domain::{
			post::{entity::Post, EngagementCounts, PostAggregate, PostFilter},
			user::UserSummary,
		},
		services::response::ServiceError,
	};

	struct InMemoryPosts {
		posts: Vec<PostAggregate>,
		fail: bool,
	}

	#[async_trait]
	impl EngagementSource for InMemoryPosts {
		async fn engaged_posts(
			&self,
			filter: &PostFilter,
		) -> Result<Vec<PostAggregate>, ServiceError> {
			if self.fail {
				return Err(ServiceError::Database(sqlx::Error::PoolTimedOut));
			}
			Ok(self
				.posts
				.iter()
				.filter(|post| {
					filter.post_ids.as_ref().map_or(true, |ids| ids.contains(&post.id))
						&& filter.owner_id.map_or(true, |owner| owner == post.user_id)
						&& filter.saved_by.is_none()
						&& filter.followed_by.is_none()
				})
				.cloned()
				.collect())
		}
	}

	#[derive(Default)]
	struct RecordingHost {
		uploads: AtomicUsize,
	}

	#[async_trait]
	impl ImageHost for RecordingHost {
		async fn upload(
			&self,
			_file: Bytes,
			file_name: &str,
		) -> Result<UploadedAsset, ServiceError> {
			self.uploads.fetch_add(1, Ordering::SeqCst);
			Ok(UploadedAsset {
				url: format!("https://images.test/{file_name}"),
				public_id: file_name.to_string(),
			})
		}
		async fn delete(
			&self,
			_public_id: &str,
		) -> Result<(), ServiceError> {
			Ok(())
		}
	}

	fn aggregate(
		likes: u64,
		comments: u64,
		hours_ago: i64,
	) -> PostAggregate {
		let created = Utc::now() - Duration::hours(hours_ago);
		let owner = Uuid::new_v4();
		PostAggregate::new(
			Post {
				id: Uuid::new_v4(),
				user_id: owner,
				content: Some("post".into()),
				image_url: None,
				image_id: None,
				create_dt: created,
				update_dt: created,
			},
			UserSummary {
				id: owner,
				username: "mago".into(),
				email: "mago@krust.dev".into(),
				full_name: None,
				avatar: None,
				banner: None,
				create_dt: created,
				update_dt: created,
			},
			EngagementCounts {
				likes_count: likes,
				comments_count: comments,
				saves_count: 0,
			},
		)
	}

	#[tokio::test]
	async fn test_trending_ranks_store_output() {
		'_given: {
			let stale = aggregate(40, 10, 24 * 30);
			let fresh = aggregate(9, 4, 2);
			let quiet = aggregate(0, 0, 1);
			let source = InMemoryPosts {
				posts: vec![quiet.clone(), stale.clone(), fresh.clone()],
				fail: false,
			};

			'_when: {
				let ranked = TrendingHandler::trending_posts(&source, Utc::now()).await.unwrap();

				'_then: {
					assert_eq!(ranked.len(), 3);
					assert_eq!(ranked[0].post.id, fresh.id);
					for pair in ranked.windows(2) {
						assert!(pair[0].score >= pair[1].score);
					}
				}
			}
		}
	}

	#[tokio::test]
	async fn test_trending_fails_whole_on_store_error() {
		let source = InMemoryPosts {
			posts: vec![aggregate(1, 1, 1)],
			fail: true,
		};
		match TrendingHandler::trending_posts(&source, Utc::now()).await {
			Err(ServiceError::Internal(message)) => assert_eq!(message, "computation failed"),
			other => panic!("unexpected {:?}", other.map(|posts| posts.len())),
		}
	}

	#[tokio::test]
	async fn test_trending_empty_store() {
		let source = InMemoryPosts { posts: vec![], fail: false };
		assert!(TrendingHandler::trending_posts(&source, Utc::now()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_upload_image_only_with_file() {
		let host = Arc::new(RecordingHost::default());

		assert_eq!(upload_image(host.as_ref(), None).await.unwrap(), None);
		assert_eq!(host.uploads.load(Ordering::SeqCst), 0);

		let stored = upload_image(
			host.as_ref(),
			Some(UploadedFile {
				file_name: "cat.png".into(),
				bytes: Bytes::from_static(b"\x89PNG"),
			}),
		)
		.await
		.unwrap()
		.unwrap();
		assert_eq!(stored.url, "https://images.test/cat.png");
		assert_eq!(stored.public_id, "cat.png");
		assert_eq!(host.uploads.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_health_envelope() {
		let response = PublicHandler::health();
		assert!(response.success);
		assert_eq!(response.message, "Server is up and running");
	}
}
