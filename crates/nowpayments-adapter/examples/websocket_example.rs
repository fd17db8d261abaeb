/*
[INPUT]:  NOWPAYMENTS_API_KEY and a payment id on the command line
[OUTPUT]: Payment status updates and connection notifications
[POS]:    Examples - WebSocket status stream handling
[UPDATE]: When WebSocket API changes
*/

use nowpayments_adapter::*;
use tokio::time::{Duration, sleep};

/// Example: Follow a payment over the WebSocket channel
///
/// Subscriptions survive reconnects; the client replays them after every
/// successful handshake.
#[tokio::main]
async fn main() {
    println!("=== NOWPayments WebSocket Example ===\n");

    let api_key = std::env::var("NOWPAYMENTS_API_KEY").unwrap_or_default();
    let payment_id = std::env::args().nth(1).unwrap_or_else(|| "5077125051".to_string());

    let ws = match NowPaymentsWebSocket::new(WebSocketConfig::sandbox(api_key)) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("Failed to create WebSocket client: {}", e);
            return;
        }
    };

    let _ = ws
        .on_notification(observer(|n| println!("  [{}] {:?}", n.name(), n)))
        .await;

    let (_handle, mut updates) = match ws.subscribe_channel(payment_id.as_str()).await {
        Ok(sub) => sub,
        Err(e) => {
            eprintln!("Subscribe failed: {}", e);
            return;
        }
    };
    println!("✓ Subscribed to payment {}", payment_id);

    if let Err(e) = ws.connect().await {
        println!("✗ Connect failed: {}", e);
        return;
    }

    let deadline = sleep(Duration::from_secs(60));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = updates.recv() => {
                let Some(event) = event else { break };
                match event.payment_update() {
                    Ok(update) => {
                        println!("✓ {} -> {:?}", update.payment_id, update.payment_status);
                        if update.payment_status.is_final() {
                            break;
                        }
                    }
                    Err(e) => println!("✗ Unexpected payload: {}", e),
                }
            }
        }
    }

    ws.close().await;
    println!("\n✓ WebSocket example complete");
}
