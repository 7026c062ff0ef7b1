use axum::extract::Multipart;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::services::response::ServiceError;

/// Field name multipart uploads carry their file under.
pub const FILE_FIELD: &str = "file";

/// Fails with `Missing required fields: a, b` when any of `fields` is absent from `body`.
pub fn require_fields(
	body: &Map<String, Value>,
	fields: &[&str],
) -> Result<(), ServiceError> {
	let missing: Vec<&str> = fields.iter().copied().filter(|field| !body.contains_key(*field)).collect();
	if missing.is_empty() {
		return Ok(());
	}
	Err(ServiceError::BadRequest(format!("Missing required fields: {}", missing.join(", "))))
}

/// Checks `fields` on a JSON body, then reads it into `T`.
pub fn parse_body<T: DeserializeOwned>(
	body: Value,
	fields: &[&str],
) -> Result<T, ServiceError> {
	let object = match body {
		Value::Object(object) => object,
		_ => Map::new(),
	};
	require_fields(&object, fields)?;
	serde_json::from_value(Value::Object(object)).map_err(|err| ServiceError::BadRequest(format!("Malformed payload: {err}")))
}

pub fn parse_id(raw: &str) -> Result<Uuid, ServiceError> {
	Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::BadRequest(format!("Invalid identifier: {raw}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
	pub file_name: String,
	pub bytes: Bytes,
}

/// Text fields plus the optional file of a multipart form.
#[derive(Debug, Default)]
pub struct FormPayload {
	pub fields: Map<String, Value>,
	pub file: Option<UploadedFile>,
}

impl FormPayload {
	pub async fn read(mut multipart: Multipart) -> Result<Self, ServiceError> {
		let mut payload = FormPayload::default();
		while let Some(field) = multipart
			.next_field()
			.await
			.map_err(|err| ServiceError::BadRequest(format!("Malformed multipart body: {err}")))?
		{
			let name = field.name().unwrap_or_default().to_string();
			if name == FILE_FIELD {
				let file_name = field.file_name().unwrap_or("upload").to_string();
				let bytes = field
					.bytes()
					.await
					.map_err(|err| ServiceError::BadRequest(format!("Malformed file upload: {err}")))?;
				if !bytes.is_empty() {
					payload.file = Some(UploadedFile { file_name, bytes });
				}
			} else {
				let text = field
					.text()
					.await
					.map_err(|err| ServiceError::BadRequest(format!("Malformed form field `{name}`: {err}")))?;
				payload.fields.insert(name, Value::String(text));
			}
		}
		Ok(payload)
	}

	/// Checks `fields` on the text part, then reads it into `T`.
	pub fn parse<T: DeserializeOwned>(
		&self,
		fields: &[&str],
	) -> Result<T, ServiceError> {
		parse_body(Value::Object(self.fields.clone()), fields)
	}
}

#[cfg(test)]
mod test {
	use serde::Deserialize;
	use serde_json::json;

	use super::{parse_body, parse_id};
	use crate::services::response::ServiceError;

	#[derive(Deserialize, Debug)]
	#[serde(rename_all = "camelCase")]
	struct CommentBody {
		post_id: String,
		content: String,
	}

	#[test]
	fn test_missing_fields_listed_in_order() {
		let result = parse_body::<CommentBody>(json!({ "other": 1 }), &["postId", "content"]);
		match result {
			Err(ServiceError::BadRequest(message)) => assert_eq!(message, "Missing required fields: postId, content"),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_present_fields_parsed() {
		let body: CommentBody = parse_body(json!({ "postId": "p", "content": "nice" }), &["postId", "content"]).unwrap();
		assert_eq!(body.post_id, "p");
		assert_eq!(body.content, "nice");
	}

	#[test]
	fn test_non_object_body_reports_missing() {
		let result = parse_body::<CommentBody>(json!([1, 2]), &["postId"]);
		assert!(matches!(result, Err(ServiceError::BadRequest(_))));
	}

	#[test]
	fn test_parse_id() {
		let id = uuid::Uuid::new_v4();
		assert_eq!(parse_id(&format!(" {id} ")).unwrap(), id);
		assert!(matches!(parse_id("64f1c0ffee"), Err(ServiceError::BadRequest(_))));
	}
}
