use crate::utils::error::TargetError;
use crate::utils::validation::parse_http_url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Wire shape shared by sub-endpoints and the aggregate response: `{"numbers": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumbersPayload {
    pub numbers: Vec<i64>,
}

/// A sequence of integers. Before finalization it is a multiset in arrival order,
/// after finalization it is strictly ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberSet(Vec<i64>);

impl NumberSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strictly ascending, i.e. sorted with no duplicates.
    pub fn is_strictly_ascending(&self) -> bool {
        self.0.windows(2).all(|pair| pair[0] < pair[1])
    }
}

impl From<Vec<i64>> for NumberSet {
    fn from(numbers: Vec<i64>) -> Self {
        Self(numbers)
    }
}

impl From<NumbersPayload> for NumberSet {
    fn from(payload: NumbersPayload) -> Self {
        Self(payload.numbers)
    }
}

impl From<NumberSet> for NumbersPayload {
    fn from(set: NumberSet) -> Self {
        Self { numbers: set.0 }
    }
}

/// 已驗證的子端點 URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(Url);

impl Target {
    /// 解析單一目標字串；必須是含主機的 http(s) 絕對 URL
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        parse_http_url(raw)
            .map(Self)
            .map_err(|reason| TargetError::Malformed {
                value: raw.to_string(),
                reason,
            })
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One absolute instant shared by every fetch spawned for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + budget,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn budget(&self) -> Duration {
        self.at.saturating_duration_since(self.started)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}
