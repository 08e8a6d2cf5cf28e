use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::Result;
use crate::storage::BlobProvider;
use crate::AppState;

#[derive(Deserialize)]
pub struct SignedUrlParams {
    pub expires: i64,
    pub sig: String,
}

/// Serve a blob through its signed URL. Possession of a valid signature
/// is the only access check; the signer already enforced viewer scoping.
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SignedUrlParams>,
) -> Result<Response> {
    let provider = state.storage.provider();
    provider.verify_signature(&key, params.expires, &params.sig)?;

    let (data, content_type) = provider.get(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}
