use std::{mem, sync::Arc};

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::services::response::ServiceError;

pub struct DatabaseExecutor {
	pool: PgPool,
	transaction: Option<Transaction<'static, Postgres>>,
}

impl DatabaseExecutor {
	pub fn new(pool: PgPool) -> Self {
		Self { pool, transaction: None }
	}
	pub fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, ServiceError> {
		self.transaction
			.as_mut()
			.ok_or_else(|| ServiceError::Internal("Transaction Has Not Begun!".into()))
	}
	pub fn connection(&self) -> &PgPool {
		&self.pool
	}

	pub(crate) async fn begin(&mut self) -> Result<(), ServiceError> {
		match self.transaction.as_mut() {
			None => {
				self.transaction = Some(self.pool.begin().await?);
				Ok(())
			}
			Some(_trx) => {
				tracing::warn!("Transaction Begun Already!");
				Err(ServiceError::Internal("Transaction Begun Already!".into()))
			}
		}
	}

	pub(crate) async fn commit(&mut self) -> Result<(), ServiceError> {
		let trx = mem::take(&mut self.transaction).ok_or_else(|| ServiceError::Internal("Transaction Has Not Begun!".into()))?;
		trx.commit().await.map_err(|err| {
			tracing::error!("Error occurred during commit operation : {:?}", err);
			ServiceError::Database(err)
		})
	}
	pub(crate) async fn rollback(&mut self) -> Result<(), ServiceError> {
		let trx = mem::take(&mut self.transaction).ok_or_else(|| ServiceError::Internal("Transaction Has Not Begun!".into()))?;
		trx.rollback().await.map_err(ServiceError::Database)
	}

	/// Commits on success, rolls back on failure and hands the outcome back.
	pub(crate) async fn finish<T>(
		&mut self,
		outcome: Result<T, ServiceError>,
	) -> Result<T, ServiceError> {
		match outcome {
			Ok(value) => {
				self.commit().await?;
				Ok(value)
			}
			Err(err) => {
				if let Err(rollback_err) = self.rollback().await {
					tracing::error!("Rollback failed after {:?}: {:?}", err, rollback_err);
				}
				Err(err)
			}
		}
	}
}

impl From<DatabaseExecutor> for Arc<RwLock<DatabaseExecutor>> {
	fn from(value: DatabaseExecutor) -> Self {
		Arc::new(RwLock::new(value))
	}
}

pub async fn connection_pool(config: &Config) -> Result<PgPool, ServiceError> {
	let pool = PgPoolOptions::new()
		.max_connections(config.max_connections)
		.connect(&config.database_url)
		.await?;
	Ok(pool)
}

/// Pool that only connects on first use.
pub fn lazy_connection_pool(config: &Config) -> Result<PgPool, ServiceError> {
	let pool = PgPoolOptions::new()
		.max_connections(config.max_connections)
		.connect_lazy(&config.database_url)?;
	Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), ServiceError> {
	sqlx::migrate!("./migrations").run(pool).await?;
	Ok(())
}
