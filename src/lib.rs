pub mod config;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use extract::{classify, Destination, ExtractReport, Extractor};
pub use fetch::{FetchOutcome, Fetcher, HttpTransport, RetryPolicy, Transport};
pub use pipeline::{FetchStatus, Outcome, Pipeline, PipelineResult, Stage, Summary};
pub use verify::{check_archive, verify, verify_entries};
