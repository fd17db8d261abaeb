/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{PaymentStatus, PayoutStatus};

/// A payment as returned by POST /payment and GET /payment/{id}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub pay_address: Option<String>,
    pub price_amount: Decimal,
    pub price_currency: String,
    #[serde(default)]
    pub pay_amount: Option<Decimal>,
    #[serde(default)]
    pub actually_paid: Option<Decimal>,
    pub pay_currency: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string_or_number")]
    pub purchase_id: Option<String>,
    #[serde(default)]
    pub outcome_amount: Option<Decimal>,
    #[serde(default)]
    pub outcome_currency: Option<String>,
    #[serde(default)]
    pub payin_extra_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_description: Option<String>,
    pub price_amount: Decimal,
    pub price_currency: String,
    #[serde(default)]
    pub pay_currency: Option<String>,
    #[serde(default)]
    pub ipn_callback_url: Option<String>,
    pub invoice_url: String,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    #[serde(default, deserialize_with = "serde_helpers::opt_string_or_number")]
    pub id: Option<String>,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub is_popular: Option<bool>,
    #[serde(default)]
    pub is_stable: Option<bool>,
}

/// One row of a payout batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    pub address: String,
    pub currency: String,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::opt_string_or_number")]
    pub batch_withdrawal_id: Option<String>,
    pub status: PayoutStatus,
    #[serde(default)]
    pub extra_id: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBalance {
    pub amount: Decimal,
    #[serde(default)]
    pub pending_amount: Decimal,
}

pub(crate) mod serde_helpers {
    use serde::{Deserialize, Deserializer, de::Error};
    use serde_json::Value;

    fn value_to_string<E: Error>(value: Value) -> Result<String, E> {
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(E::custom(format!("expected string or number, got {other}"))),
        }
    }

    /// Ids are numeric on some endpoints and strings on others
    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        value_to_string(Value::deserialize(deserializer)?)
    }

    pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => value_to_string(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_payment_accepts_numeric_id_and_amounts() {
        let payment: Payment = serde_json::from_value(serde_json::json!({
            "payment_id": 5077125051u64,
            "payment_status": "waiting",
            "pay_address": "0xd1cDE08A07cD25adEbEd35c3867a59228C09B606",
            "price_amount": 170,
            "price_currency": "usd",
            "pay_amount": 155.38559757,
            "pay_currency": "mana",
            "order_id": "order-1",
            "purchase_id": 6084744717u64,
            "created_at": "2021-04-12T14:22:54.983Z"
        }))
        .unwrap();

        assert_eq!(payment.payment_id, "5077125051");
        assert_eq!(payment.payment_status, PaymentStatus::Waiting);
        assert_eq!(payment.price_amount, Decimal::from(170));
        assert_eq!(
            payment.pay_amount,
            Some(Decimal::from_str("155.38559757").unwrap())
        );
        assert_eq!(payment.purchase_id.as_deref(), Some("6084744717"));
        assert!(payment.actually_paid.is_none());
        assert_eq!(
            payment.created_at.map(|at| at.timestamp_millis()),
            Some(1_618_237_374_983)
        );
    }

    #[test]
    fn test_withdrawal_status() {
        let withdrawal: Withdrawal = serde_json::from_value(serde_json::json!({
            "id": "5000000713",
            "address": "TEmGwPeRTPiLFLVfBxXkSP91yc5GMNQhfS",
            "currency": "trx",
            "amount": "200",
            "batch_withdrawal_id": "5000000000",
            "status": "WAITING",
            "createdAt": "2020-11-12T17:06:12.791Z"
        }))
        .unwrap();
        assert_eq!(withdrawal.status, PayoutStatus::Waiting);
        assert_eq!(withdrawal.amount, Decimal::from(200));
        assert_eq!(withdrawal.batch_withdrawal_id.as_deref(), Some("5000000000"));
    }
}
