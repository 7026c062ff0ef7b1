use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Uniform envelope every endpoint answers with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
	pub success: bool,
	pub status_code: u16,
	pub message: String,
	pub data: T,
	pub error: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
	pub fn ok(
		message: impl Into<String>,
		data: T,
	) -> Self {
		Self::with_status(StatusCode::OK, message, data)
	}

	pub fn with_status(
		status: StatusCode,
		message: impl Into<String>,
		data: T,
	) -> Self {
		Self {
			success: status.as_u16() < 400,
			status_code: status.as_u16(),
			message: message.into(),
			data,
			error: None,
		}
	}
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self)).into_response()
	}
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	Forbidden(String),

	#[error("{0}")]
	NotFound(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),

	#[error("Image host error: {0}")]
	ImageHost(String),

	#[error("Token error: {0}")]
	Token(#[from] jsonwebtoken::errors::Error),

	#[error("{0}")]
	Internal(String),
}

impl ServiceError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
			ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
			ServiceError::Config(_)
			| ServiceError::Database(_)
			| ServiceError::Migration(_)
			| ServiceError::ImageHost(_)
			| ServiceError::Token(_)
			| ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message shown to the client. Storage failures stay in the log.
	pub fn public_message(&self) -> String {
		match self {
			ServiceError::Database(_) | ServiceError::Migration(_) => "Something went wrong while accessing storage".to_string(),
			other => other.to_string(),
		}
	}

	/// Unique-constraint violations become a 400 carrying `message`; anything else passes through.
	pub fn on_conflict(
		self,
		message: &str,
	) -> Self {
		let is_conflict = matches!(
			&self,
			ServiceError::Database(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505")
		);
		if is_conflict {
			ServiceError::BadRequest(message.to_string())
		} else {
			self
		}
	}
}

impl IntoResponse for ServiceError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!("{}", self);
		} else {
			tracing::debug!("request rejected ({}): {}", status, self);
		}
		let message = self.public_message();

		let body = ApiResponse {
			success: false,
			status_code: status.as_u16(),
			message: message.clone(),
			data: serde_json::Value::Null,
			error: Some(json!({ "message": message })),
		};
		(status, Json(body)).into_response()
	}
}
