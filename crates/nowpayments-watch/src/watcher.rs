/*
[INPUT]:  Payment ids, a NOWPayments WebSocket handle, shutdown token
[OUTPUT]: Logged status transitions; returns once every payment is final
[POS]:    Watch layer - payment status tracking (no REST calls)
[UPDATE]: When changing completion rules or subscription flow
*/

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nowpayments_adapter::{
    ConnectionState,
    NowPaymentsWebSocket,
    PaymentStatus,
    PaymentUpdate,
    listener,
    observer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Every watched payment reached a final status
    AllFinal,
    /// Shutdown was requested
    Cancelled,
    /// The connection closed for good (reconnect attempts exhausted)
    ConnectionClosed,
}

/// Last known status per watched payment
#[derive(Debug, Clone, Default)]
pub struct PaymentWatcher {
    statuses: BTreeMap<String, Option<PaymentStatus>>,
}

impl PaymentWatcher {
    pub fn new<I, S>(payment_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: payment_ids
                .into_iter()
                .map(|id| (id.into(), None))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn status(&self, payment_id: &str) -> Option<PaymentStatus> {
        self.statuses.get(payment_id).copied().flatten()
    }

    pub fn statuses(&self) -> &BTreeMap<String, Option<PaymentStatus>> {
        &self.statuses
    }

    /// Record a status. Returns true if it changed.
    pub fn record(&mut self, payment_id: &str, status: PaymentStatus) -> bool {
        let Some(slot) = self.statuses.get_mut(payment_id) else {
            debug!(%payment_id, "status for unwatched payment ignored");
            return false;
        };
        if *slot == Some(status) {
            return false;
        }
        *slot = Some(status);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.statuses
            .values()
            .all(|status| status.is_some_and(|status| status.is_final()))
    }

    /// Subscribe every pending payment and follow updates until all are
    /// final, shutdown is requested or the connection is gone for good.
    pub async fn run(
        &mut self,
        ws: &NowPaymentsWebSocket,
        shutdown: CancellationToken,
    ) -> Result<WatchOutcome> {
        if self.is_complete() {
            return Ok(WatchOutcome::AllFinal);
        }

        let (tx, mut updates) = mpsc::unbounded_channel::<PaymentUpdate>();
        let pending: Vec<String> = self
            .statuses
            .iter()
            .filter(|(_, status)| !status.is_some_and(|status| status.is_final()))
            .map(|(id, _)| id.clone())
            .collect();
        for payment_id in pending {
            let tx = tx.clone();
            let forward = listener(move |event| {
                let update = event.payment_update()?;
                // receiver gone means the watch already returned
                let _ = tx.send(update);
                Ok(())
            });
            ws.subscribe(payment_id.as_str(), forward)
                .await
                .with_context(|| format!("subscribe payment {payment_id}"))?;
            info!(%payment_id, "watching payment");
        }
        drop(tx);

        ws.on_notification(observer(|notification| {
            info!(notification = notification.name(), detail = ?notification, "ws notification");
        }))
        .await
        .context("register notification observer")?;

        ws.connect().await.context("connect websocket")?;

        let mut state = ws.connection_state();
        loop {
            let closed = async {
                let _ = state
                    .wait_for(|state| *state == ConnectionState::Closed)
                    .await;
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(WatchOutcome::Cancelled),
                update = updates.recv() => {
                    let Some(update) = update else {
                        return Ok(WatchOutcome::ConnectionClosed);
                    };
                    self.apply(update);
                    if self.is_complete() {
                        return Ok(WatchOutcome::AllFinal);
                    }
                }
                _ = closed => {
                    warn!("websocket closed; stopping watch");
                    return Ok(WatchOutcome::ConnectionClosed);
                }
            }
        }
    }

    fn apply(&mut self, update: PaymentUpdate) {
        let previous = self.status(&update.payment_id);
        if self.record(&update.payment_id, update.payment_status) {
            info!(
                payment_id = %update.payment_id,
                from = ?previous,
                to = ?update.payment_status,
                actually_paid = ?update.actually_paid,
                pay_currency = ?update.pay_currency,
                "payment status changed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use nowpayments_adapter::{Connector, ReconnectConfig, WebSocketConfig, WsTransport};
    use serde_json::json;

    use super::*;

    /// Acks auth, then replays `frames` and stays open
    struct ScriptedConnector {
        frames: Vec<String>,
    }

    struct ScriptedTransport {
        queue: VecDeque<String>,
        frames: Vec<String>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> nowpayments_adapter::Result<Box<dyn WsTransport>> {
            Ok(Box::new(ScriptedTransport {
                queue: VecDeque::new(),
                frames: self.frames.clone(),
            }))
        }
    }

    #[async_trait]
    impl WsTransport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> nowpayments_adapter::Result<()> {
            if text.contains("\"auth\"") {
                self.queue.push_back(json!({ "type": "auth_success" }).to_string());
            } else if text.contains("\"subscribe\"") {
                self.queue.extend(self.frames.drain(..));
            }
            Ok(())
        }

        async fn next_text(&mut self) -> Option<nowpayments_adapter::Result<String>> {
            match self.queue.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    fn frame(payment_id: &str, status: &str) -> String {
        json!({
            "type": "payment_status",
            "payload": { "payment_id": payment_id, "payment_status": status }
        })
        .to_string()
    }

    fn socket(frames: Vec<String>) -> NowPaymentsWebSocket {
        let config = WebSocketConfig {
            ping_interval: None,
            reconnect: ReconnectConfig {
                max_attempts: Some(1),
                ..ReconnectConfig::default()
            },
            ..WebSocketConfig::new("test-key")
        };
        NowPaymentsWebSocket::with_connector(config, Arc::new(ScriptedConnector { frames })).unwrap()
    }

    #[test]
    fn test_record_and_completion() {
        let mut watcher = PaymentWatcher::new(["1", "2"]);
        assert!(!watcher.is_complete());

        assert!(watcher.record("1", PaymentStatus::Waiting));
        assert!(!watcher.record("1", PaymentStatus::Waiting));
        assert!(!watcher.record("unknown", PaymentStatus::Finished));

        watcher.record("1", PaymentStatus::Finished);
        assert!(!watcher.is_complete());
        watcher.record("2", PaymentStatus::Expired);
        assert!(watcher.is_complete());
        assert_eq!(watcher.status("2"), Some(PaymentStatus::Expired));
    }

    #[tokio::test]
    async fn test_run_returns_when_all_final() {
        let ws = socket(vec![
            frame("1", "confirming"),
            frame("2", "waiting"),
            frame("1", "finished"),
            frame("2", "failed"),
        ]);
        let mut watcher = PaymentWatcher::new(["1", "2"]);

        let outcome = watcher.run(&ws, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, WatchOutcome::AllFinal);
        assert_eq!(watcher.status("1"), Some(PaymentStatus::Finished));
        assert_eq!(watcher.status("2"), Some(PaymentStatus::Failed));
        ws.close().await;
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let ws = socket(vec![frame("1", "waiting")]);
        let mut watcher = PaymentWatcher::new(["1"]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = watcher.run(&ws, shutdown).await.unwrap();
        assert_eq!(outcome, WatchOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_already_final_payments_skip_connect() {
        let ws = socket(Vec::new());
        let mut watcher = PaymentWatcher::new(["1"]);
        watcher.record("1", PaymentStatus::Finished);

        let outcome = watcher.run(&ws, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, WatchOutcome::AllFinal);
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }
}
