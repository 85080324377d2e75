use crate::core::{ConfigProvider, Deadline, FetchOutcome, Fetcher, NumberSet, Target};
use crate::domain::model::NumbersPayload;
use crate::utils::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::Client;

/// [`Fetcher`] backed by a shared reqwest connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// 依設定建立 HTTP client；請求總時間由共享期限控制，不在 client 上設定
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn request(&self, target: &Target) -> FetchOutcome {
        let unavailable = |source: reqwest::Error| FetchError::EndpointUnavailable {
            target: target.to_string(),
            source,
        };

        let response = self
            .client
            .get(target.url().clone())
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedResponse {
                target: target.to_string(),
                reason: format!("unexpected status {}", status),
            });
        }

        let body = response.bytes().await.map_err(unavailable)?;
        let payload: NumbersPayload =
            serde_json::from_slice(&body).map_err(|e| FetchError::UnexpectedResponse {
                target: target.to_string(),
                reason: format!("failed to decode numbers payload: {}", e),
            })?;

        Ok(NumberSet::from(payload))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &Target, deadline: Deadline) -> FetchOutcome {
        // Dropping the request future on timeout cancels the in-flight request.
        let outcome = match tokio::time::timeout_at(deadline.instant(), self.request(target)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::RequestTimedOut {
                target: target.to_string(),
                waited: deadline.elapsed(),
            }),
        };

        log_outcome(target, &outcome);
        outcome
    }
}

/// One event per terminal fetch outcome.
pub(crate) fn log_outcome(target: &Target, outcome: &FetchOutcome) {
    match outcome {
        Ok(numbers) => {
            tracing::info!(endpoint = %target, count = numbers.len(), "📥 Received numbers");
        }
        Err(e) => {
            tracing::warn!(endpoint = %target, kind = %e.kind(), detail = %e, "⚠️ Fetch failed");
        }
    }
}
