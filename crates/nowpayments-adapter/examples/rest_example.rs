/*
[INPUT]:  NOWPAYMENTS_API_KEY environment variable
[OUTPUT]: API status, currencies, price estimate and minimum amount
[POS]:    Examples - public REST queries
[UPDATE]: When adding new REST endpoints
*/

use nowpayments_adapter::*;
use rust_decimal::Decimal;

/// Example: Query the NOWPayments REST API against the sandbox
///
/// Transient failures (429 / 5xx / network) are retried with backoff;
/// anything else is returned on the first attempt.
#[tokio::main]
async fn main() {
    println!("=== NOWPayments REST Example ===\n");

    let api_key = std::env::var("NOWPAYMENTS_API_KEY").unwrap_or_default();
    let client = match NowPaymentsClient::with_config(ClientConfig::sandbox(api_key)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created (sandbox)\n");

    match client.get_status().await {
        Ok(status) => println!("✓ API status: {}", status.message),
        Err(e) => println!("✗ Error: {} ({:?})", e, e.kind()),
    }

    match client.get_currencies(None).await {
        Ok(list) => println!("✓ {} currencies available", list.currencies.len()),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nEstimating 100 USD in BTC...");
    match client
        .get_estimate_price(Decimal::from(100), "usd", "btc")
        .await
    {
        Ok(estimate) => println!("✓ ~{} {}", estimate.estimated_amount, estimate.currency_to),
        Err(e) => println!("✗ Error: {}", e),
    }

    match client.get_min_amount("btc", "usd").await {
        Ok(min) => println!("✓ Minimum BTC payment: {}", min.min_amount),
        Err(e) => println!("✗ Error: {}", e),
    }

    // Rejected locally, never reaches the network
    match client.get_estimate_price(Decimal::ZERO, "usd", "btc").await {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("\n✓ Validation caught locally: {}", e),
    }

    println!("\n✓ REST example complete");
}
