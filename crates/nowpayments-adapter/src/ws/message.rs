/*
[INPUT]:  Raw WebSocket text frames
[OUTPUT]: Parsed InboundEvent values and outbound control frames
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing format
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{NowPaymentsError, Result};
use crate::types::models::serde_helpers;
use crate::types::{PaymentStatus, PayoutStatus};

/// Classification of the `type` field of an inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    PaymentStatus,
    PayoutStatus,
    InvoiceStatus,
    AuthSuccess,
    AuthError,
    Subscribed,
    Unsubscribed,
    Pong,
    Error,
    Unknown(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_status" => EventKind::PaymentStatus,
            "payout_status" => EventKind::PayoutStatus,
            "invoice_status" => EventKind::InvoiceStatus,
            "auth_success" | "authenticated" => EventKind::AuthSuccess,
            "auth_error" => EventKind::AuthError,
            "subscribed" => EventKind::Subscribed,
            "unsubscribed" => EventKind::Unsubscribed,
            "pong" => EventKind::Pong,
            "error" => EventKind::Error,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::PaymentStatus => "payment_status",
            EventKind::PayoutStatus => "payout_status",
            EventKind::InvoiceStatus => "invoice_status",
            EventKind::AuthSuccess => "auth_success",
            EventKind::AuthError => "auth_error",
            EventKind::Subscribed => "subscribed",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::Pong => "pong",
            EventKind::Error => "error",
            EventKind::Unknown(other) => other,
        }
    }

    /// Status events are fanned out to subscribers; everything else is
    /// protocol chatter handled by the connection itself
    pub fn is_routable(&self) -> bool {
        matches!(
            self,
            EventKind::PaymentStatus | EventKind::PayoutStatus | EventKind::InvoiceStatus
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, deserialize_with = "serde_helpers::opt_string_or_number")]
    key: Option<String>,
}

const PAYLOAD_KEY_FIELDS: [&str; 4] = ["payment_id", "id", "payout_id", "invoice_id"];

/// One inbound frame, parsed once and immutable afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub kind: EventKind,
    /// Subscription key the event routes to, if any
    pub key: Option<String>,
    pub payload: Value,
    pub raw: String,
}

impl InboundEvent {
    pub fn parse(raw: &str) -> Result<Self> {
        let frame: RawFrame = serde_json::from_str(raw).map_err(|err| {
            NowPaymentsError::websocket_with_source("unparseable frame", err)
        })?;

        let key = frame.key.or_else(|| {
            PAYLOAD_KEY_FIELDS.iter().find_map(|field| match frame.payload.get(field) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
        });

        Ok(Self {
            kind: EventKind::from_type(&frame.event_type),
            key,
            payload: frame.payload,
            raw: raw.to_string(),
        })
    }

    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }

    /// Server supplied message of `error`/`auth_error` frames
    pub fn error_message(&self) -> String {
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.raw.clone())
    }

    pub fn payment_update(&self) -> Result<PaymentUpdate> {
        serde_json::from_value(self.payload.clone()).map_err(|err| {
            NowPaymentsError::websocket_with_source("invalid payment_status payload", err)
        })
    }

    pub fn payout_update(&self) -> Result<PayoutUpdate> {
        serde_json::from_value(self.payload.clone()).map_err(|err| {
            NowPaymentsError::websocket_with_source("invalid payout_status payload", err)
        })
    }
}

/// Payload of a `payment_status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    #[serde(alias = "id", deserialize_with = "serde_helpers::string_or_number")]
    pub payment_id: String,
    #[serde(alias = "status")]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub pay_amount: Option<Decimal>,
    #[serde(default)]
    pub actually_paid: Option<Decimal>,
    #[serde(default)]
    pub pay_currency: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload of a `payout_status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutUpdate {
    #[serde(alias = "payout_id", deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    pub status: PayoutStatus,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outbound control messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Auth { api_key: String },
    Subscribe { key: String },
    Unsubscribe { key: String },
    Ping,
}

impl ControlFrame {
    pub fn to_text(&self) -> String {
        let value = match self {
            ControlFrame::Auth { api_key } => json!({ "action": "auth", "apiKey": api_key }),
            ControlFrame::Subscribe { key } => json!({ "action": "subscribe", "key": key }),
            ControlFrame::Unsubscribe { key } => json!({ "action": "unsubscribe", "key": key }),
            ControlFrame::Ping => json!({ "action": "ping" }),
        };
        value.to_string()
    }

    pub fn action(&self) -> &'static str {
        match self {
            ControlFrame::Auth { .. } => "auth",
            ControlFrame::Subscribe { .. } => "subscribe",
            ControlFrame::Unsubscribe { .. } => "unsubscribe",
            ControlFrame::Ping => "ping",
        }
    }
}

/// How a frame received during the auth handshake is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HandshakeReply {
    Ack,
    Rejected(String),
    Ignored,
}

pub(crate) fn classify_handshake_reply(raw: &str) -> HandshakeReply {
    match InboundEvent::parse(raw) {
        Ok(event) => match event.kind {
            EventKind::AuthSuccess => HandshakeReply::Ack,
            EventKind::AuthError | EventKind::Error => {
                HandshakeReply::Rejected(event.error_message())
            }
            _ => HandshakeReply::Ignored,
        },
        Err(_) => HandshakeReply::Ignored,
    }
}
