/*
[INPUT]:  NOWPayments public API documentation
[OUTPUT]: Base URLs, header names, endpoint paths and retry tables
[POS]:    Constant tables - consumed read-only by HTTP and WebSocket layers
[UPDATE]: When NOWPayments moves endpoints or changes retry guidance
*/

/// Base URLs for the NOWPayments API
pub const API_BASE_URL: &str = "https://api.nowpayments.io/v1/";
pub const SANDBOX_API_BASE_URL: &str = "https://api-sandbox.nowpayments.io/v1/";

/// Real-time payment status stream
pub const WS_URL: &str = "wss://ws.nowpayments.io/";
pub const SANDBOX_WS_URL: &str = "wss://ws-sandbox.nowpayments.io/";

pub const API_KEY_HEADER: &str = "x-api-key";

/// HTTP statuses considered transient by the retry policy
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

pub mod endpoints {
    pub const STATUS: &str = "status";
    pub const CURRENCIES: &str = "currencies";
    pub const FULL_CURRENCIES: &str = "full-currencies";
    pub const MERCHANT_COINS: &str = "merchant/coins";
    pub const ESTIMATE: &str = "estimate";
    pub const MIN_AMOUNT: &str = "min-amount";
    pub const PAYMENT: &str = "payment";
    pub const INVOICE: &str = "invoice";
    pub const INVOICE_PAYMENT: &str = "invoice-payment";
    pub const AUTH: &str = "auth";
    pub const BALANCE: &str = "balance";
    pub const PAYOUT: &str = "payout";
}

/// Commonly used pay currencies, lowercase tickers as the API expects
pub const COMMON_CURRENCIES: &[&str] = &[
    "btc", "eth", "ltc", "xmr", "usdttrc20", "usdterc20", "usdc", "bnbbsc", "trx", "doge",
    "sol", "ton",
];

/// Fiat tickers accepted as `price_currency`
pub const FIAT_CURRENCIES: &[&str] = &["usd", "eur", "gbp", "cad", "aud", "jpy", "chf"];
