use crate::domain::model::{Deadline, NumberSet, Target};
use crate::utils::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

pub type FetchOutcome = std::result::Result<NumberSet, FetchError>;

/// Fetches one number fragment from one sub-endpoint, bounded by the shared deadline.
///
/// Implementations must give up once `deadline` is reached and report
/// [`FetchError::RequestTimedOut`]; they never touch the aggregator themselves.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &Target, deadline: Deadline) -> FetchOutcome;
}

pub trait ConfigProvider: Send + Sync {
    fn listen_addr(&self) -> &str;
    fn route(&self) -> &str;
    fn query_key(&self) -> &str;
    fn deadline(&self) -> Duration;
    fn overhead(&self) -> Duration;
    fn connect_timeout(&self) -> Option<Duration>;

    /// 子請求實際可用的時間：總期限扣掉回應開銷
    fn fetch_budget(&self) -> Duration {
        self.deadline().saturating_sub(self.overhead())
    }
}
