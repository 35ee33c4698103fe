use async_trait::async_trait;
use hyper::Uri;
use ota_config::UpdaterConfig;
use ota_update::{parse_value, UpdateRecord};
use ota_utils::http::{get, http_status_is_ok, RetryPolicy};
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Somewhere update metadata for a device can be fetched from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch the update payload, which must be a single JSON object.
    async fn fetch(&self, device: &str) -> Result<Value, FetchError>;
}

pub fn user_agent(device: &str, build_date: &str) -> String {
    format!(
        "ota-updater/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        device,
        build_date
    )
}

pub struct HttpUpdateSource {
    base_url: String,
    user_agent: String,
    policy: RetryPolicy,
}

impl HttpUpdateSource {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            policy,
        }
    }

    pub fn from_config(config: &UpdaterConfig, device: &str, build_date: &str) -> Self {
        Self::new(
            config.base_url.clone(),
            user_agent(device, build_date),
            config.retry_policy(),
        )
    }

    /// `<base>/<urlencoded device>`
    pub fn server_url(&self, device: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(device)
        )
    }
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    async fn fetch(&self, device: &str) -> Result<Value, FetchError> {
        let url = self.server_url(device);
        let uri: Uri = url.parse().map_err(|_| FetchError::InvalidUrl(url.clone()))?;
        let header_map = HashMap::from([
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ]);

        let rsp = get(uri, &header_map, &self.policy).await?;
        if !http_status_is_ok(rsp.status) {
            return Err(FetchError::Status(rsp.status));
        }
        let body = rsp.body.unwrap_or_default();
        let value: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(FetchError::Malformed("expected a JSON object".to_string()));
        }
        Ok(value)
    }
}

/// Fetch and parse the available updates for `device`.
///
/// Cancelling `token` before the payload arrives yields
/// [`FetchError::Cancelled`]; once it has arrived parsing always completes.
pub async fn check_for_updates(
    source: &dyn UpdateSource,
    device: &str,
    token: &CancellationToken,
) -> Result<Vec<UpdateRecord>, FetchError> {
    let payload = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(FetchError::Cancelled),
        result = source.fetch(device) => result?,
    };
    Ok(parse_value(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source(base_url: &str) -> HttpUpdateSource {
        HttpUpdateSource::new(
            base_url,
            "ota-updater/test",
            RetryPolicy::new(Duration::from_secs(5), 0, 1.0),
        )
    }

    #[test]
    fn test_server_url_encodes_device() {
        let source = source("https://api.example.org/ota/");
        assert_eq!(
            source.server_url("beryllium"),
            "https://api.example.org/ota/beryllium"
        );
        assert_eq!(
            source.server_url("Pixel 3/XL"),
            "https://api.example.org/ota/Pixel%203%2FXL"
        );
    }

    #[test]
    fn test_user_agent_mentions_device() {
        let ua = user_agent("beryllium", "1704067200");
        assert!(ua.starts_with("ota-updater/"));
        assert!(ua.contains("(beryllium; 1704067200)"));
    }

    #[test]
    fn test_invalid_base_url() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(source("not a url").fetch("device"))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    struct PendingSource;

    #[async_trait]
    impl UpdateSource for PendingSource {
        async fn fetch(&self, _device: &str) -> Result<Value, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_before_response() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let result = check_for_updates(&PendingSource, "device", &token).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
