//! Source trait definitions

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::FetchError;
use crate::models::ChannelRecord;

/// Retrieves and parses a remote channel-list document
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url` and return its channel records in document order
    ///
    /// Implementations should abandon the request with
    /// [`FetchError::Cancelled`] once `cancel` fires.
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChannelRecord>, FetchError>;
}
