/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::models::{CurrencyBalance, CurrencyInfo, Payment, Withdrawal, serde_helpers};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub message: String,
}

impl ApiStatus {
    pub fn is_ok(&self) -> bool {
        self.message.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrenciesResponse {
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullCurrenciesResponse {
    pub currencies: Vec<CurrencyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantCoinsResponse {
    #[serde(rename = "selectedCurrencies")]
    pub selected_currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatePrice {
    pub currency_from: String,
    pub amount_from: Decimal,
    pub currency_to: String,
    pub estimated_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinAmount {
    pub currency_from: String,
    pub currency_to: String,
    pub min_amount: Decimal,
    #[serde(default)]
    pub fiat_equivalent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentList {
    pub data: Vec<Payment>,
    pub limit: u32,
    pub page: u32,
    pub pages_count: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateUpdate {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub token_id: Option<String>,
    pub pay_amount: Decimal,
    #[serde(default)]
    pub expiration_estimate_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

pub type Balances = HashMap<String, CurrencyBalance>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    pub withdrawals: Vec<Withdrawal>,
}
