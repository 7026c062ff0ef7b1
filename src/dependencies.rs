use std::sync::Arc;

use sqlx::PgPool;

use crate::{
	adapters::{
		image_host::{CloudinaryClient, ImageHost},
		repositories::Repository,
	},
	config::Config,
	database::DatabaseExecutor,
	services::auth::TokenIssuer,
};

/// Everything a request needs, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<Config>,
	pub pool: PgPool,
	pub tokens: Arc<TokenIssuer>,
	pub image_host: Arc<dyn ImageHost>,
}

impl AppState {
	pub fn new(
		config: Config,
		pool: PgPool,
	) -> Self {
		let image_host: Arc<dyn ImageHost> = Arc::new(CloudinaryClient::new(config.cloudinary.clone()));
		Self::with_image_host(config, pool, image_host)
	}

	pub fn with_image_host(
		config: Config,
		pool: PgPool,
		image_host: Arc<dyn ImageHost>,
	) -> Self {
		Self {
			tokens: Arc::new(TokenIssuer::new(&config)),
			config: Arc::new(config),
			pool,
			image_host,
		}
	}

	/// Fresh repository with its own executor; transactions never span requests.
	pub fn repository<A>(&self) -> Repository<A> {
		Repository::new(DatabaseExecutor::new(self.pool.clone()).into())
	}
}
