/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public NOWPayments adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod constants;
pub mod error;
pub mod http;
pub mod types;
pub mod validation;
pub mod ws;

pub use error::{ErrorKind, NowPaymentsError, Result};

// Re-export commonly used types from http
pub use http::{
    ApiRequest,
    ClientConfig,
    Execute,
    HttpExecutor,
    NowPaymentsClient,
    RawResponse,
    RetryConfig,
    RetryPolicy,
};

// Re-export all types
pub use types::*;

pub use validation::{DefaultValidator, Validator};

// Re-export commonly used types from ws
pub use ws::{
    ConnectionState,
    Connector,
    EventKind,
    InboundEvent,
    Listener,
    Notification,
    NowPaymentsWebSocket,
    Observer,
    PaymentUpdate,
    PayoutUpdate,
    ReconnectConfig,
    SubscriptionHandle,
    WebSocketConfig,
    WsTransport,
    listener,
    observer,
};
