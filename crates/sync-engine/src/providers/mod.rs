//! Provider adapters: translate one external API's event shape into
//! canonical deployment fields and push them through the dedup store.

pub mod github;
pub mod vercel;

use crate::error::SyncError;
use reqwest::{Response, StatusCode};

pub(crate) fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Provider(format!("request timed out: {err}"))
    } else {
        SyncError::Provider(err.to_string())
    }
}

/// Classify a non-2xx response. 401/403 means the stored credential is bad
/// and the integration should be disconnected; everything else is a
/// transient provider failure retried on the next run.
pub(crate) async fn check_status(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().clone();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(SyncError::Auth(format!("{status} from {url}")))
        }
        _ => Err(SyncError::Provider(format!("{status} from {url}"))),
    }
}
