/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod executor;
pub mod payment;
pub mod payout;
pub mod public;
pub mod retry;

pub use crate::error::{NowPaymentsError, Result};

pub use client::{ClientConfig, NowPaymentsClient};
pub use executor::{ApiRequest, Execute, HttpExecutor, RawResponse};
pub use retry::{RetryConfig, RetryPolicy};
