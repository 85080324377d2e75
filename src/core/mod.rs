pub mod aggregator;
pub mod fanout;
pub mod fetcher;

pub use crate::domain::model::{Deadline, NumberSet, NumbersPayload, Target};
pub use crate::domain::ports::{ConfigProvider, FetchOutcome, Fetcher};
pub use crate::utils::error::Result;
