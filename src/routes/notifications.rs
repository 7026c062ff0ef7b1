use axum::{
	extract::State,
	middleware,
	routing::{get, patch},
	Extension, Router,
};

use crate::{
	common::middleware_auth::{authorize, CurrentUser},
	dependencies::AppState,
	domain::notification::NotificationView,
	services::{
		handlers::{NotificationHandler, SeenUpdate},
		response::{ApiResponse, ServiceResult},
	},
};

async fn all_notifications(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<ApiResponse<Vec<NotificationView>>> {
	NotificationHandler::all(&state, &user).await
}

async fn mark_as_seen(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<ApiResponse<SeenUpdate>> {
	NotificationHandler::mark_as_seen(&state, &user).await
}

pub fn notification_routers(state: AppState) -> Router<AppState> {
	Router::new()
		.route("/all", get(all_notifications))
		.route("/mark-as-seen", patch(mark_as_seen))
		.route_layer(middleware::from_fn_with_state(state, authorize))
}
