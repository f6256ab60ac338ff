use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckResponse {
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortcodeQuery<'a> {
    pub size: u64,
    pub version: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcodeResponse {
    pub shortcode: String,
    pub url: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    pub transcoder_options: TranscoderOptions,
    pub video: VideoLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscoderOptions {
    pub token: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoLocation {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadataRequest<'a> {
    pub original_name: &'a str,
    pub original_size: u64,
    pub title: &'a str,
    pub upload_source: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeRequest<'a> {
    pub shortcode: &'a str,
    pub size: u64,
    pub token: &'a str,
    pub upload_source: &'a str,
    pub url: &'a str,
}

/// Presigned form fields are usually strings, but the storage backend accepts
/// the plain text rendering of any JSON scalar.
pub fn form_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
