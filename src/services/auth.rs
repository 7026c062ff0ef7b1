use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
	Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, domain::user::User, services::response::ServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
	pub user_id: Uuid,
	pub username: String,
	pub iat: i64,
	pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
	pub user_id: Uuid,
	pub iat: i64,
	pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	pub access_token: String,
	pub refresh_token: String,
}

/// Signs and verifies access and refresh tokens with their own secrets.
#[derive(Clone)]
pub struct TokenIssuer {
	access_encoding: EncodingKey,
	access_decoding: DecodingKey,
	access_expiry: Duration,
	refresh_encoding: EncodingKey,
	refresh_decoding: DecodingKey,
	refresh_expiry: Duration,
}

impl TokenIssuer {
	pub fn new(config: &Config) -> Self {
		Self {
			access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
			access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
			access_expiry: Duration::seconds(config.access_expiry_secs),
			refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
			refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
			refresh_expiry: Duration::seconds(config.refresh_expiry_secs),
		}
	}

	pub fn issue_access(
		&self,
		user: &User,
	) -> Result<String, ServiceError> {
		let now = Utc::now();
		let claims = AccessClaims {
			user_id: user.id,
			username: user.username.clone(),
			iat: now.timestamp(),
			exp: (now + self.access_expiry).timestamp(),
		};
		Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
	}

	pub fn issue_refresh(
		&self,
		user: &User,
	) -> Result<String, ServiceError> {
		let now = Utc::now();
		let claims = RefreshClaims {
			user_id: user.id,
			iat: now.timestamp(),
			exp: (now + self.refresh_expiry).timestamp(),
		};
		Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
	}

	pub fn issue_pair(
		&self,
		user: &User,
	) -> Result<TokenPair, ServiceError> {
		Ok(TokenPair {
			access_token: self.issue_access(user)?,
			refresh_token: self.issue_refresh(user)?,
		})
	}

	pub fn verify_access(
		&self,
		token: &str,
	) -> Result<AccessClaims, ServiceError> {
		decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
			.map(|data| data.claims)
			.map_err(|err| {
				tracing::debug!("access token rejected: {}", err);
				ServiceError::Forbidden("Access token expired!".into())
			})
	}

	pub fn verify_refresh(
		&self,
		token: &str,
	) -> Result<RefreshClaims, ServiceError> {
		decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
			.map(|data| data.claims)
			.map_err(|err| {
				tracing::debug!("refresh token rejected: {}", err);
				ServiceError::Unauthorized("Refresh token invalid or expired!".into())
			})
	}

	pub fn access_max_age(&self) -> i64 {
		self.access_expiry.num_seconds()
	}

	pub fn refresh_max_age(&self) -> i64 {
		self.refresh_expiry.num_seconds()
	}
}

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map_err(|e| ServiceError::Internal(format!("Password hashing failed: {}", e)))?
		.to_string();
	Ok(hash)
}

pub fn verify_password(
	password: &str,
	password_hash: &str,
) -> Result<bool, ServiceError> {
	let parsed_hash = PasswordHash::new(password_hash)
		.map_err(|e| ServiceError::Internal(format!("Invalid password hash format: {}", e)))?;

	match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
		Ok(_) => Ok(true),
		Err(argon2::password_hash::Error::Password) => Ok(false),
		Err(e) => Err(ServiceError::Internal(format!("Password verification failed: {}", e))),
	}
}

#[cfg(test)]
mod test {
	use chrono::Utc;
	use uuid::Uuid;

	use super::{hash_password, verify_password, TokenIssuer};
	use crate::{config::Config, domain::user::User, services::response::ServiceError};

	fn config() -> Config {
		Config::from_lookup(|key| match key {
			"DATABASE_URL" => Some("postgres://localhost/social".into()),
			"ACCESS_SECRET" => Some("access-secret".into()),
			"REFRESH_SECRET" => Some("refresh-secret".into()),
			_ => None,
		})
		.unwrap()
	}

	fn user() -> User {
		let now = Utc::now();
		User {
			id: Uuid::new_v4(),
			username: "migo".into(),
			email: "migo@krust.dev".into(),
			full_name: None,
			avatar: None,
			avatar_id: None,
			banner: None,
			password_hash: String::new(),
			refresh_token: None,
			create_dt: now,
			update_dt: now,
		}
	}

	#[test]
	fn test_access_token_round_trip() {
		let issuer = TokenIssuer::new(&config());
		let user = user();

		let token = issuer.issue_access(&user).unwrap();
		let claims = issuer.verify_access(&token).unwrap();
		assert_eq!(claims.user_id, user.id);
		assert_eq!(claims.username, "migo");
		assert_eq!(claims.exp - claims.iat, issuer.access_max_age());
	}

	#[test]
	fn test_tokens_are_not_interchangeable() {
		let issuer = TokenIssuer::new(&config());
		let pair = issuer.issue_pair(&user()).unwrap();

		assert!(matches!(issuer.verify_access(&pair.refresh_token), Err(ServiceError::Forbidden(_))));
		assert!(matches!(issuer.verify_refresh(&pair.access_token), Err(ServiceError::Unauthorized(_))));
		assert!(issuer.verify_refresh(&pair.refresh_token).is_ok());
	}

	#[test]
	fn test_expired_token_rejected() {
		let mut config = config();
		// well past the default 60s leeway
		config.access_expiry_secs = -3600;
		let issuer = TokenIssuer::new(&config);
		let token = issuer.issue_access(&user()).unwrap();

		match issuer.verify_access(&token) {
			Err(ServiceError::Forbidden(message)) => assert_eq!(message, "Access token expired!"),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_garbage_token_rejected() {
		let issuer = TokenIssuer::new(&config());
		assert!(issuer.verify_access("not.a.token").is_err());
	}

	#[test]
	fn test_password_hash_and_verify() {
		let hash = hash_password("correct horse battery staple").unwrap();
		assert!(hash.starts_with("$argon2"));
		assert!(verify_password("correct horse battery staple", &hash).unwrap());
		assert!(!verify_password("Tr0ub4dor&3", &hash).unwrap());
		assert!(verify_password("anything", "not-a-phc-string").is_err());
	}
}
