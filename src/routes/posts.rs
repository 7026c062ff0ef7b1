use axum::{
	extract::{Multipart, State},
	middleware,
	routing::{get, patch, post},
	Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
	common::{
		middleware_auth::{authorize, CurrentUser},
		request::{parse_body, parse_id, FormPayload},
	},
	dependencies::AppState,
	domain::{
		post::{
			entity::{Comment, CommentView, Post, PostLike, PostSave},
			PostAggregate,
		},
		trending::ScoredPost,
	},
	services::{
		handlers::PostHandler,
		response::{ApiResponse, ServiceResult},
	},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostIdBody {
	post_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
	user_id: String,
}

#[derive(Deserialize)]
struct OwnedPostBody {
	#[serde(rename = "_id")]
	id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody {
	post_id: String,
	content: String,
}

#[derive(Deserialize)]
struct CreatePostForm {
	content: String,
}

#[derive(Deserialize)]
struct UpdatePostForm {
	#[serde(rename = "_id")]
	id: String,
	content: Option<String>,
}

async fn get_post(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<PostAggregate>> {
	let body: PostIdBody = parse_body(body, &["postId"])?;
	PostHandler::get_post(&state, parse_id(&body.post_id)?).await
}

async fn create_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	multipart: Multipart,
) -> ServiceResult<ApiResponse<Post>> {
	let mut form = FormPayload::read(multipart).await?;
	let fields: CreatePostForm = form.parse(&["content"])?;
	PostHandler::create_post(&state, &user, &fields.content, form.file.take()).await
}

async fn update_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	multipart: Multipart,
) -> ServiceResult<ApiResponse<Post>> {
	let mut form = FormPayload::read(multipart).await?;
	let fields: UpdatePostForm = form.parse(&["_id"])?;
	let post_id = parse_id(&fields.id)?;
	PostHandler::update_post(&state, &user, post_id, fields.content.as_deref(), form.file.take()).await
}

async fn delete_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Post>> {
	let body: OwnedPostBody = parse_body(body, &["_id"])?;
	PostHandler::delete_post(&state, &user, parse_id(&body.id)?).await
}

async fn all_posts(State(state): State<AppState>) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
	PostHandler::all_posts(&state).await
}

async fn trending_posts(State(state): State<AppState>) -> ServiceResult<ApiResponse<Vec<ScoredPost>>> {
	PostHandler::trending_posts(&state).await
}

async fn following_posts(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
	PostHandler::following_posts(&state, &user).await
}

async fn like_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<PostLike>> {
	let body: PostIdBody = parse_body(body, &["postId"])?;
	PostHandler::like_post(&state, &user, parse_id(&body.post_id)?).await
}

async fn comment_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Comment>> {
	let body: CommentBody = parse_body(body, &["postId", "content"])?;
	PostHandler::comment(&state, &user, parse_id(&body.post_id)?, &body.content).await
}

async fn save_post(
	State(state): State<AppState>,
	Extension(user): Extension<CurrentUser>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<PostSave>> {
	let body: PostIdBody = parse_body(body, &["postId"])?;
	PostHandler::save_post(&state, &user, parse_id(&body.post_id)?).await
}

async fn post_comments(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Vec<CommentView>>> {
	let body: PostIdBody = parse_body(body, &["postId"])?;
	PostHandler::comments(&state, parse_id(&body.post_id)?).await
}

async fn user_posts(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
	let body: UserIdBody = parse_body(body, &["userId"])?;
	PostHandler::user_posts(&state, parse_id(&body.user_id)?).await
}

async fn user_saves(
	State(state): State<AppState>,
	Json(body): Json<Value>,
) -> ServiceResult<ApiResponse<Vec<PostAggregate>>> {
	let body: UserIdBody = parse_body(body, &["userId"])?;
	PostHandler::user_saves(&state, parse_id(&body.user_id)?).await
}

pub fn post_routers(state: AppState) -> Router<AppState> {
	Router::new()
		.route("/create", post(create_post))
		.route("/update", patch(update_post))
		.route("/delete", post(delete_post))
		.route("/all", get(all_posts))
		.route("/trending", get(trending_posts))
		.route("/following", get(following_posts))
		.route("/like", post(like_post))
		.route("/comment", post(comment_post))
		.route("/save", post(save_post))
		.route("/posts", post(user_posts))
		.route("/saves", post(user_saves))
		.route_layer(middleware::from_fn_with_state(state, authorize))
		.route("/", post(get_post))
		.route("/comments", post(post_comments))
}
