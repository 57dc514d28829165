use std::future::Future;
use std::time::Instant;

use tracing::info;

use crate::error::FetchError;
use crate::session::AuthSession;

/// Source of raw schedule pages. One attempt per call; callers decide what a
/// failure means.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl PageFetcher for AuthSession {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        fetch_module(self, url).await
    }
}

/// GET one module page through the logged-in session.
pub async fn fetch_module(session: &AuthSession, url: &str) -> Result<String, FetchError> {
    let transport = |source| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    info!("Getting module page {}", url);
    let start = Instant::now();
    let response = session.client().get(url).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(transport)?;
    info!(
        "Fetched {} ({} bytes, HTTP {}) in {}ms",
        url,
        body.len(),
        status,
        start.elapsed().as_millis()
    );
    Ok(body)
}
