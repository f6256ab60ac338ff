//! Client for uploading videos to streamable.com.
//!
//! [`StreamableClient::login`] exchanges credentials for a [`Session`], and
//! [`StreamableClient::upload`] drives the upload workflow: request a slot,
//! push the file to the presigned storage URL, set the video metadata and
//! start transcoding.

pub mod client;
pub mod error;
pub mod rest_types;

pub use client::{
    DEFAULT_BASE_URL, Session, StreamableClient, UploadResult, UploadSlot, VideoMetadata,
    default_title,
};
pub use error::{AuthError, AuthErrorKind, Error, Result, Step};
