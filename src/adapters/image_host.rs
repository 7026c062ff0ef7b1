use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::{config::CloudinaryConfig, services::response::ServiceError};

/// Where an uploaded asset ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedAsset {
	pub url: String,
	pub public_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
	url: Option<String>,
	secure_url: Option<String>,
	public_id: String,
}

impl TryFrom<UploadResponse> for UploadedAsset {
	type Error = ServiceError;
	fn try_from(value: UploadResponse) -> Result<Self, Self::Error> {
		let url = value
			.secure_url
			.or(value.url)
			.ok_or_else(|| ServiceError::ImageHost("Upload response carried no URL".into()))?;
		Ok(UploadedAsset {
			url,
			public_id: value.public_id,
		})
	}
}

/// Third-party binary asset store.
#[async_trait]
pub trait ImageHost: Send + Sync {
	async fn upload(
		&self,
		file: Bytes,
		file_name: &str,
	) -> Result<UploadedAsset, ServiceError>;

	async fn delete(
		&self,
		public_id: &str,
	) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct CloudinaryClient {
	http: reqwest::Client,
	config: CloudinaryConfig,
	base_url: String,
}

#[derive(Deserialize)]
struct CloudinaryErrorBody {
	error: CloudinaryErrorMessage,
}

#[derive(Deserialize)]
struct CloudinaryErrorMessage {
	message: String,
}

#[derive(Deserialize)]
struct DestroyResult {
	result: String,
}

impl CloudinaryClient {
	pub fn new(config: CloudinaryConfig) -> Self {
		Self {
			http: reqwest::Client::new(),
			base_url: format!("https://api.cloudinary.com/v1_1/{}", config.cloud_name),
			config,
		}
	}

	fn ensure_configured(&self) -> Result<(), ServiceError> {
		if self.config.cloud_name.is_empty() || self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
			return Err(ServiceError::ImageHost("Image host credentials are not configured".into()));
		}
		Ok(())
	}

	async fn failure_message(response: reqwest::Response) -> String {
		let status = response.status();
		match response.json::<CloudinaryErrorBody>().await {
			Ok(body) => body.error.message,
			Err(_) => format!("Image host answered {status}"),
		}
	}
}

/// Signature over the request parameters: sorted `key=value` pairs joined by `&`,
/// followed by the api secret, SHA-1 hashed and hex encoded.
pub fn sign(
	params: &[(&str, String)],
	api_secret: &str,
) -> String {
	let mut sorted: Vec<&(&str, String)> = params.iter().collect();
	sorted.sort_by(|a, b| a.0.cmp(&b.0));
	let to_sign = sorted
		.iter()
		.map(|(key, value)| format!("{key}={value}"))
		.collect::<Vec<_>>()
		.join("&");

	let mut hasher = Sha1::new();
	hasher.update(to_sign.as_bytes());
	hasher.update(api_secret.as_bytes());
	hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryClient {
	async fn upload(
		&self,
		file: Bytes,
		file_name: &str,
	) -> Result<UploadedAsset, ServiceError> {
		self.ensure_configured()?;
		let timestamp = Utc::now().timestamp().to_string();
		let signature = sign(&[("timestamp", timestamp.clone())], &self.config.api_secret);

		let part = reqwest::multipart::Part::bytes(file.to_vec()).file_name(file_name.to_string());
		let form = reqwest::multipart::Form::new()
			.part("file", part)
			.text("api_key", self.config.api_key.clone())
			.text("timestamp", timestamp)
			.text("signature", signature);

		let response = self
			.http
			.post(format!("{}/auto/upload", self.base_url))
			.multipart(form)
			.send()
			.await
			.map_err(|err| ServiceError::ImageHost(err.to_string()))?;

		if !response.status().is_success() {
			return Err(ServiceError::ImageHost(Self::failure_message(response).await));
		}

		let asset: UploadedAsset = response
			.json::<UploadResponse>()
			.await
			.map_err(|err| ServiceError::ImageHost(err.to_string()))?
			.try_into()?;
		tracing::info!("File uploaded successfully. URL: {}", asset.url);
		Ok(asset)
	}

	async fn delete(
		&self,
		public_id: &str,
	) -> Result<(), ServiceError> {
		self.ensure_configured()?;
		let timestamp = Utc::now().timestamp().to_string();
		let signature = sign(
			&[("public_id", public_id.to_string()), ("timestamp", timestamp.clone())],
			&self.config.api_secret,
		);

		let response = self
			.http
			.post(format!("{}/image/destroy", self.base_url))
			.form(&[
				("public_id", public_id),
				("api_key", self.config.api_key.as_str()),
				("timestamp", timestamp.as_str()),
				("signature", signature.as_str()),
			])
			.send()
			.await
			.map_err(|err| ServiceError::ImageHost(err.to_string()))?;

		if !response.status().is_success() {
			return Err(ServiceError::ImageHost(Self::failure_message(response).await));
		}

		let outcome = response
			.json::<DestroyResult>()
			.await
			.map_err(|err| ServiceError::ImageHost(err.to_string()))?;
		match outcome.result.as_str() {
			"ok" => Ok(()),
			other => Err(ServiceError::ImageHost(format!("Could not delete asset {public_id}: {other}"))),
		}
	}
}

/// Deletes an asset without failing the caller; the record it belonged to is already gone.
pub async fn delete_best_effort(
	host: &dyn ImageHost,
	public_id: &str,
) {
	if let Err(err) = host.delete(public_id).await {
		tracing::warn!("Could not delete image {} from image host: {}", public_id, err);
	}
}

#[cfg(test)]
mod test {
	use super::{sign, CloudinaryClient, ImageHost, UploadResponse, UploadedAsset};
	use crate::{config::CloudinaryConfig, services::response::ServiceError};

	#[test]
	fn test_signature_sorts_params() {
		// sha1("public_id=sample_image&timestamp=1315060510abcd")
		let signature = sign(
			&[("timestamp", "1315060510".to_string()), ("public_id", "sample_image".to_string())],
			"abcd",
		);
		let expected = sign(
			&[("public_id", "sample_image".to_string()), ("timestamp", "1315060510".to_string())],
			"abcd",
		);
		assert_eq!(signature, expected);
		assert_eq!(signature.len(), 40);
		assert_eq!(signature, "b4ad47fb4e25c7bf5f92a20089f9db59bc302313");
	}

	#[test]
	fn test_upload_response_prefers_secure_url() {
		let response: UploadResponse = serde_json::from_str(
			r#"{"url":"http://res.cloudinary.com/x.png","secure_url":"https://res.cloudinary.com/x.png","public_id":"x"}"#,
		)
		.unwrap();
		let asset = UploadedAsset::try_from(response).unwrap();
		assert_eq!(asset.url, "https://res.cloudinary.com/x.png");
		assert_eq!(asset.public_id, "x");

		let bare: UploadResponse = serde_json::from_str(r#"{"public_id":"x"}"#).unwrap();
		assert!(UploadedAsset::try_from(bare).is_err());
	}

	#[tokio::test]
	async fn test_unconfigured_client_refuses() {
		let client = CloudinaryClient::new(CloudinaryConfig::default());
		let result = client.delete("anything").await;
		assert!(matches!(result, Err(ServiceError::ImageHost(_))));
	}
}
