mod auth;
mod health;
mod uploads;
mod users;

pub use auth::*;
pub use health::*;
pub use uploads::{read_multipart, UploadedForm};
pub use users::*;

use axum::extract::FromRequest;

use crate::error::ApiError;

/// JSON extractor whose rejections use the API envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
