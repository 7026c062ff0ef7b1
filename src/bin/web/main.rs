use std::{net::SocketAddr, str::FromStr};

use axum::http::{
	header::{AUTHORIZATION, CONTENT_TYPE},
	HeaderValue, Method,
};
use social_post::{
	config::Config,
	database::{connection_pool, run_migrations},
	dependencies::AppState,
	routes::create_routes,
	services::response::ServiceError,
};
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cors_layer(config: &Config) -> CorsLayer {
	let origins: Vec<HeaderValue> = config
		.allowed_origins()
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!("ignoring malformed origin `{}`", origin);
				None
			}
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_credentials(true)
		.allow_headers([CONTENT_TYPE, AUTHORIZATION])
		.allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE])
}

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
	let config = Config::new()?;

	// ! Tracing
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			// axum logs rejections from built-in extractors with the `axum::rejection`
			// target, at `TRACE` level. `axum::rejection=trace` enables showing those events
			format!("social_post={},tower_http=debug,axum::rejection=trace", config.log_level).into()
		}))
		.with(tracing_subscriber::fmt::layer())
		.init();

	// ! Connection
	tracing::info!("Connections Are Being Pooled...");
	let pool = connection_pool(&config).await?;
	run_migrations(&pool).await?;

	let addr = SocketAddr::from_str(&config.server_ip_port)
		.map_err(|err| ServiceError::Config(format!("SERVER_IP_PORT `{}`: {}", config.server_ip_port, err)))?;
	let cors = cors_layer(&config);

	let app = create_routes(AppState::new(config, pool))
		.layer(cors)
		.layer(TraceLayer::new_for_http());

	tracing::info!("Start Web Server on {}...", addr);
	axum::Server::bind(&addr)
		.serve(app.into_make_service())
		.await
		.map_err(|err| ServiceError::Internal(format!("Server error: {err}")))
}
