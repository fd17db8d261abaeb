/*
[INPUT]:  Raw inbound frames, the subscription registry, lifecycle notifications
[OUTPUT]: Listener invocations and observer notifications, each isolated
[POS]:    WebSocket layer - event classification and fan-out
[UPDATE]: When adding routable event types or notification kinds
*/

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::NowPaymentsError;

use super::message::{EventKind, InboundEvent};
use super::subscription::{Listener, SubscriptionRegistry};

/// Connection lifecycle notifications delivered to observers
#[derive(Debug)]
pub enum Notification {
    Connected,
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    /// Terminal: the attempt cap was hit and the connection is now closed
    ReconnectFailed { attempts: u32 },
    Error(NowPaymentsError),
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Connected => "connected",
            Notification::Disconnected { .. } => "disconnected",
            Notification::Reconnecting { .. } => "reconnecting",
            Notification::ReconnectFailed { .. } => "reconnect-failed",
            Notification::Error(_) => "error",
        }
    }
}

pub type Observer = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Wrap a closure as an `Observer`
pub fn observer<F>(f: F) -> Observer
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Counts from routing one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
}

/// Parses frames and fans them out.
///
/// Listeners and observers are invoked in registration order. A listener
/// returning `Err` or panicking is reported through an `Error` notification
/// and delivery continues with the next one.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Vec<Observer>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    pub fn notify(&self, notification: &Notification) {
        for observer in &self.observers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer(notification))) {
                warn!(
                    notification = notification.name(),
                    panic = %panic_message(&*panic),
                    "ws observer panicked"
                );
            }
        }
    }

    pub fn on_frame(&self, raw: &str, registry: &SubscriptionRegistry) -> DispatchOutcome {
        let event = match InboundEvent::parse(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(bytes = raw.len(), error = %err, "ws frame dropped");
                self.notify(&Notification::Error(err));
                return DispatchOutcome::default();
            }
        };

        match &event.kind {
            kind if kind.is_routable() => self.route(&event, registry),
            EventKind::Error | EventKind::AuthError => {
                let message = event.error_message();
                warn!(event_type = event.event_type(), %message, "ws server error");
                self.notify(&Notification::Error(NowPaymentsError::websocket(format!(
                    "server error: {message}"
                ))));
                DispatchOutcome::default()
            }
            _ => {
                debug!(event_type = event.event_type(), "ws control frame");
                DispatchOutcome::default()
            }
        }
    }

    fn route(&self, event: &InboundEvent, registry: &SubscriptionRegistry) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let topic = event.event_type();

        if let Some(key) = event.key.as_deref() {
            for listener in registry.listeners(key) {
                self.invoke(listener, key, event, &mut outcome);
            }
        }
        if event.key.as_deref() != Some(topic) {
            for listener in registry.listeners(topic) {
                self.invoke(listener, topic, event, &mut outcome);
            }
        }

        if outcome.delivered + outcome.failed == 0 {
            debug!(event_type = topic, key = ?event.key, "ws event without listeners");
        }
        outcome
    }

    fn invoke(
        &self,
        listener: &Listener,
        key: &str,
        event: &InboundEvent,
        outcome: &mut DispatchOutcome,
    ) {
        let error = match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Ok(())) => {
                outcome.delivered += 1;
                return;
            }
            Ok(Err(err)) => {
                NowPaymentsError::websocket_with_source(format!("listener for `{key}` failed"), err)
            }
            Err(panic) => NowPaymentsError::websocket(format!(
                "listener for `{key}` panicked: {}",
                panic_message(&*panic)
            )),
        };

        outcome.failed += 1;
        warn!(%key, error = %error, "ws listener failed");
        self.notify(&Notification::Error(error));
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
