use crate::services::response::ServiceError;

#[derive(Clone, Debug)]
pub struct Config {
	/// Which errors we want to log
	pub log_level: String,

	/// Port server is listening to
	pub server_ip_port: String,
	pub database_url: String,
	pub max_connections: u32,
	pub allow_origins: String,

	pub access_secret: String,
	pub access_expiry_secs: i64,
	pub refresh_secret: String,
	pub refresh_expiry_secs: i64,

	pub cloudinary: CloudinaryConfig,
}

#[derive(Clone, Debug, Default)]
pub struct CloudinaryConfig {
	pub cloud_name: String,
	pub api_key: String,
	pub api_secret: String,
}

impl Config {
	pub fn new() -> Result<Config, ServiceError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the configuration from any key lookup, so tests need not touch the process environment.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ServiceError> {
		let required = |key: &str| lookup(key).ok_or_else(|| ServiceError::Config(format!("{key} must be set!")));
		let parsed = |key: &str, default: i64| -> Result<i64, ServiceError> {
			match lookup(key) {
				None => Ok(default),
				Some(raw) => raw
					.parse()
					.map_err(|_| ServiceError::Config(format!("{key} must be a whole number of seconds, got `{raw}`"))),
			}
		};

		let log_level = lookup("LOG_LEVEL").unwrap_or("warn".to_string());
		let server_ip_port = lookup("SERVER_IP_PORT").unwrap_or("0.0.0.0:80".into());
		let database_url = required("DATABASE_URL")?;
		let max_connections = match lookup("MAX_CONNECTIONS") {
			None => 30,
			Some(raw) => raw
				.trim()
				.parse::<u32>()
				.ok()
				.filter(|count| *count > 0)
				.ok_or_else(|| ServiceError::Config(format!("MAX_CONNECTIONS must be a positive whole number, got `{raw}`")))?,
		};
		let allow_origins = lookup("ALLOW_ORIGINS").unwrap_or("http://localhost:3000,http://localhost:3001".to_string());

		let access_secret = required("ACCESS_SECRET")?;
		let access_expiry_secs = parsed("ACCESS_EXPIRY_SECS", 60 * 60 * 24)?;
		let refresh_secret = required("REFRESH_SECRET")?;
		let refresh_expiry_secs = parsed("REFRESH_EXPIRY_SECS", 60 * 60 * 24 * 10)?;

		let cloudinary = CloudinaryConfig {
			cloud_name: lookup("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
			api_key: lookup("CLOUDINARY_CLOUD_API_KEY").unwrap_or_default(),
			api_secret: lookup("CLOUDINARY_CLOUD_API_SECRET").unwrap_or_default(),
		};

		Ok(Config {
			log_level,
			server_ip_port,
			database_url,
			max_connections,
			allow_origins,
			access_secret,
			access_expiry_secs,
			refresh_secret,
			refresh_expiry_secs,
			cloudinary,
		})
	}

	pub fn allowed_origins(&self) -> Vec<String> {
		self.allow_origins
			.split(',')
			.map(str::trim)
			.filter(|origin| !origin.is_empty())
			.map(str::to_string)
			.collect()
	}
}
