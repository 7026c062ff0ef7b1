pub mod notification_repository;
pub mod post_repository;
pub mod user_repository;

use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::database::DatabaseExecutor;
use crate::domain::post::{PostAggregate, PostFilter};
use crate::services::response::ServiceError;

pub struct Repository<A> {
	pub executor: Arc<RwLock<DatabaseExecutor>>,
	pub _phantom: PhantomData<A>,
}

impl<A> Repository<A> {
	pub fn new(executor: Arc<RwLock<DatabaseExecutor>>) -> Self {
		Self {
			executor,
			_phantom: Default::default(),
		}
	}

	pub(crate) async fn pool(&self) -> PgPool {
		self.executor.read().await.connection().clone()
	}
}

/// Read side the trending ranking is computed from: posts joined with their
/// owner summary and like/comment/save counts.
#[async_trait]
pub trait EngagementSource: Send + Sync {
	async fn engaged_posts(
		&self,
		filter: &PostFilter,
	) -> Result<Vec<PostAggregate>, ServiceError>;
}
