/*
[INPUT]:  WebSocket configuration, subscription keys and listeners
[OUTPUT]: Real-time payment / payout status events and connection notifications
[POS]:    WebSocket layer - real-time status streams
[UPDATE]: When adding new event types or changing connection logic
*/

pub mod client;
pub mod dispatcher;
pub mod message;
pub mod reconnect;
pub mod subscription;
pub mod transport;

pub use client::{ConnectionState, NowPaymentsWebSocket, WebSocketConfig};
pub use dispatcher::{DispatchOutcome, EventDispatcher, Notification, Observer, observer};
pub use message::{ControlFrame, EventKind, InboundEvent, PaymentUpdate, PayoutUpdate};
pub use reconnect::{ReconnectConfig, ReconnectStrategy};
pub use subscription::{
    Listener,
    ListenerError,
    ListenerResult,
    Removal,
    SubscriptionHandle,
    SubscriptionRegistry,
    listener,
};
pub use transport::{Connector, TungsteniteConnector, TungsteniteTransport, WsTransport};
