//! HTTP response utilities.
//!
//! Provides shared functions for serving responses the proxy generates itself.

use pingora::Result;
use pingora::http::ResponseHeader;
use pingora::proxy::Session;
use serde::Serialize;

/// Serves a JSON response and ends the request.
///
/// # Errors
///
/// Returns an error if headers cannot be built or response cannot be written.
pub async fn serve_json<T: Serialize + Sync>(
    session: &mut Session,
    status: u16,
    body: &T,
) -> Result<bool> {
    let payload = json_body(body);

    let mut header = ResponseHeader::build(status, None)?;
    header.insert_header("Content-Type", "application/json")?;
    header.insert_header("Content-Length", payload.len().to_string())?;
    header.insert_header("Cache-Control", "no-store")?;

    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(bytes::Bytes::from(payload)), true)
        .await?;
    Ok(true)
}

fn json_body<T: Serialize>(body: &T) -> Vec<u8> {
    serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec())
}
