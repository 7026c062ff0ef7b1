pub mod entity;

pub use entity::{Follow, User, UserProfile, UserSummary};

/// Usernames are stored trimmed and lower-cased so uniqueness is case-insensitive.
pub fn normalize_username(raw: &str) -> String {
	raw.trim().to_lowercase()
}

pub fn normalize_email(raw: &str) -> String {
	raw.trim().to_string()
}

#[cfg(test)]
mod test {
	use chrono::Utc;
	use uuid::Uuid;

	use super::{normalize_email, normalize_username, User, UserSummary};

	#[test]
	fn test_normalization() {
		assert_eq!(normalize_username("  MigoMigo "), "migomigo");
		assert_eq!(normalize_email(" migo@krust.dev  "), "migo@krust.dev");
	}

	#[test]
	fn test_summary_drops_credentials() {
		let now = Utc::now();
		let user = User {
			id: Uuid::new_v4(),
			username: "migo".into(),
			email: "migo@krust.dev".into(),
			full_name: Some("Migo Mago".into()),
			avatar: None,
			avatar_id: Some("avatars/migo".into()),
			banner: None,
			password_hash: "$argon2id$secret".into(),
			refresh_token: Some("refresh".into()),
			create_dt: now,
			update_dt: now,
		};

		let value = serde_json::to_value(UserSummary::from(user.clone())).unwrap();
		assert_eq!(value["_id"], user.id.to_string());
		assert_eq!(value["fullName"], "Migo Mago");
		assert!(value.get("passwordHash").is_none());
		assert!(value.get("refreshToken").is_none());
		assert!(value.get("avatarId").is_none());
	}
}
