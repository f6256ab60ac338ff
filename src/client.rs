use std::{path::Path, sync::Arc};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::error::{AuthError, AuthErrorKind, Error, Result, Step};
use crate::rest_types::{
    CheckRequest, CheckResponse, ShortcodeQuery, ShortcodeResponse, TranscodeRequest,
    TranscoderOptions, VideoMetadataRequest, form_field_value,
};

pub const DEFAULT_BASE_URL: &str = "https://ajax.streamable.com";

/// Fixed client version the shortcode endpoint expects.
pub const PROTOCOL_VERSION: &str = "cc764e2a719399c2eb83ee6171fc50ba9fba8018";
pub const UPLOAD_SOURCE: &str = "web";

const CHECK_ROUTE: &str = "check";
const SHORTCODE_ROUTE: &str = "shortcode";
const VIDEOS_ROUTE: &str = "videos";
const TRANSCODE_ROUTE: &str = "transcode";

/// Cookie jar handed out by a successful login.
///
/// The handle itself never changes; the jar behind it takes the cookies the
/// API sets on later calls, the way a browser session would.
#[derive(Debug, Clone, Default)]
pub struct Session {
    jar: Arc<Jar>,
}

impl Session {
    /// Builds a session from raw `Set-Cookie` header values received from
    /// `url`. Attributes such as `Path` and `Max-Age` are honoured.
    pub fn from_set_cookie<'a, I>(url: &Url, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let jar = Jar::default();
        for value in values {
            jar.add_cookie_str(value, url);
        }
        Self { jar: Arc::new(jar) }
    }

    /// The `Cookie` header this session sends to `url`, if any.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }
}

/// Server-issued upload slot, valid for a single upload.
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub shortcode: String,
    pub upload_url: String,
    pub upload_fields: Map<String, Value>,
    pub transcoder: TranscoderOptions,
    pub video_url: String,
}

impl From<ShortcodeResponse> for UploadSlot {
    fn from(response: ShortcodeResponse) -> Self {
        Self {
            shortcode: response.shortcode,
            upload_url: response.url,
            upload_fields: response.fields,
            transcoder: response.transcoder_options,
            video_url: response.video.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub original_name: String,
    pub size: u64,
    pub upload_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub shortcode: String,
    pub url: String,
    pub file_url: String,
    pub size: u64,
    pub original_name: String,
}

/// File name without its extension, used when no title is given.
pub fn default_title<P: AsRef<Path>>(file: P) -> Option<String> {
    file.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Talks to the API with a per-session cookie jar. Requests to the presigned
/// storage URL go through `storage`, which has no cookie store.
pub struct StreamableClient {
    storage: Client,
    base_url: Url,
}

impl Default for StreamableClient {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).expect("Default base URL is valid"))
    }
}

impl StreamableClient {
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            storage: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        Ok(self.base_url.join(route)?)
    }

    fn video_endpoint(&self, route: &str, shortcode: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(route)
            .push(shortcode);
        Ok(url)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let url = self.endpoint(CHECK_ROUTE)?;
        debug!(%url, username, "Checking credentials");

        let session = Session::default();
        let api = api_client(Step::Login, session.jar())?;

        let request = CheckRequest { username, password };
        let response = send(Step::Login, api.post(url).json(&request)).await?;
        let response = ensure_success(Step::Login, response).await?;

        let check: CheckResponse = read_json(Step::Login, response).await?;
        if let Some(code) = check.error {
            let kind = AuthErrorKind::from_code(&code);
            let message = check.message.unwrap_or_else(|| code.clone());
            return Err(AuthError { kind, message }.into());
        }

        info!(username, "Logged in");
        Ok(session)
    }

    /// Runs the four upload steps in order, stopping at the first failure.
    pub async fn upload<P: AsRef<Path>>(
        &self,
        session: Option<&Session>,
        file: P,
        title: Option<&str>,
    ) -> Result<UploadResult> {
        let file = file.as_ref();

        let original_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath {
                path: file.to_path_buf(),
            })?;

        let size = tokio::fs::metadata(file)
            .await
            .map_err(|source| Error::Io {
                path: file.to_path_buf(),
                source,
            })?
            .len();

        let jar = session.map(Session::jar).unwrap_or_default();
        let api = api_client(Step::RequestSlot, jar)?;

        let slot = self.request_upload(&api, size).await?;
        info!(shortcode = %slot.shortcode, size, "Upload slot assigned");

        self.upload_from_presigned_url(file, &slot).await?;
        info!(shortcode = %slot.shortcode, "File uploaded");

        let title = match title {
            Some(title) => title.to_string(),
            None => default_title(file).unwrap_or_else(|| original_name.clone()),
        };

        let metadata = VideoMetadata {
            title,
            original_name,
            size,
            upload_source: UPLOAD_SOURCE.to_string(),
        };
        self.set_video_info(&api, &slot.shortcode, &metadata)
            .await?;
        info!(shortcode = %slot.shortcode, title = %metadata.title, "Video metadata set");

        self.transcode(&api, &slot).await?;
        info!(shortcode = %slot.shortcode, "Transcoding started");

        Ok(UploadResult {
            shortcode: slot.shortcode,
            url: slot.video_url,
            file_url: slot.transcoder.url,
            size: slot.transcoder.size,
            original_name: metadata.original_name,
        })
    }

    async fn request_upload(&self, api: &Client, size: u64) -> Result<UploadSlot> {
        let url = self.endpoint(SHORTCODE_ROUTE)?;
        debug!(%url, size, "Requesting upload slot");

        let query = ShortcodeQuery {
            size,
            version: PROTOCOL_VERSION,
        };
        let request = api.get(url).query(&query);
        let response = send(Step::RequestSlot, request).await?;
        let response = ensure_success(Step::RequestSlot, response).await?;

        let slot: ShortcodeResponse = read_json(Step::RequestSlot, response).await?;
        Ok(slot.into())
    }

    /// The presigned URL carries its own authorization, so no session cookies
    /// are sent to the storage host.
    async fn upload_from_presigned_url(&self, file: &Path, slot: &UploadSlot) -> Result<()> {
        debug!(url = %slot.upload_url, fields = slot.upload_fields.len(), "Uploading to presigned URL");

        let file_part = reqwest::multipart::Part::file(file)
            .await
            .map_err(|source| Error::Io {
                path: file.to_path_buf(),
                source,
            })?;

        let form = slot
            .upload_fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), form_field_value(value))
            })
            .part("file", file_part);

        let request = self.storage.post(&slot.upload_url).multipart(form);
        let response = send(Step::RawUpload, request).await?;
        ensure_success(Step::RawUpload, response).await?;

        Ok(())
    }

    async fn set_video_info(
        &self,
        api: &Client,
        shortcode: &str,
        metadata: &VideoMetadata,
    ) -> Result<()> {
        let url = self.video_endpoint(VIDEOS_ROUTE, shortcode)?;
        debug!(%url, "Setting video metadata");

        let body = VideoMetadataRequest {
            original_name: &metadata.original_name,
            original_size: metadata.size,
            title: &metadata.title,
            upload_source: &metadata.upload_source,
        };
        let request = api.put(url).json(&body);
        let response = send(Step::SetMetadata, request).await?;
        ensure_success(Step::SetMetadata, response).await?;

        Ok(())
    }

    async fn transcode(&self, api: &Client, slot: &UploadSlot) -> Result<()> {
        let url = self.video_endpoint(TRANSCODE_ROUTE, &slot.shortcode)?;
        debug!(%url, "Triggering transcode");

        let body = TranscodeRequest {
            shortcode: &slot.shortcode,
            size: slot.transcoder.size,
            token: &slot.transcoder.token,
            upload_source: UPLOAD_SOURCE,
            url: &slot.transcoder.url,
        };
        let request = api.post(url).json(&body);
        let response = send(Step::Transcode, request).await?;
        ensure_success(Step::Transcode, response).await?;

        Ok(())
    }
}

fn api_client(step: Step, jar: Arc<Jar>) -> Result<Client> {
    Client::builder()
        .cookie_provider(jar)
        .build()
        .map_err(|source| Error::Network { step, source })
}

async fn send(step: Step, request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|source| Error::Network { step, source })
}

async fn ensure_success(step: Step, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(%step, error = %e, "Unable to read error response body");
            String::new()
        }
    };
    Err(Error::Transport { step, status, body })
}

async fn read_json<T: DeserializeOwned>(step: Step, response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|source| Error::Network { step, source })?;
    serde_json::from_str(&body).map_err(|source| Error::Decode { step, source })
}
