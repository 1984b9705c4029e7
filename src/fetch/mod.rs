// src/fetch/mod.rs

pub mod archive;
pub mod retry;
pub mod transport;
pub mod urls;

pub use archive::{FetchOutcome, Fetcher};
pub use retry::{RetryError, RetryPolicy};
pub use transport::{HttpTransport, RemoteBody, Transport};
