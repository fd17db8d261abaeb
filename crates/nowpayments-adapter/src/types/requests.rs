/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{PaymentSortBy, SortOrder};

/// POST /payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_currency: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_extra_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_rate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fee_paid_by_user: Option<bool>,
}

impl CreatePaymentRequest {
    pub fn new(
        price_amount: Decimal,
        price_currency: impl Into<String>,
        pay_currency: impl Into<String>,
    ) -> Self {
        Self {
            price_amount,
            price_currency: price_currency.into(),
            pay_currency: pay_currency.into(),
            pay_amount: None,
            ipn_callback_url: None,
            order_id: None,
            order_description: None,
            purchase_id: None,
            payout_address: None,
            payout_currency: None,
            payout_extra_id: None,
            fixed_rate: None,
            is_fee_paid_by_user: None,
        }
    }
}

/// POST /invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    pub price_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partially_paid_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fixed_rate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fee_paid_by_user: Option<bool>,
}

impl CreateInvoiceRequest {
    pub fn new(price_amount: Decimal, price_currency: impl Into<String>) -> Self {
        Self {
            price_amount,
            price_currency: price_currency.into(),
            pay_currency: None,
            ipn_callback_url: None,
            order_id: None,
            order_description: None,
            success_url: None,
            cancel_url: None,
            partially_paid_url: None,
            is_fixed_rate: None,
            is_fee_paid_by_user: None,
        }
    }
}

/// POST /invoice-payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePaymentRequest {
    pub iid: String,
    pub pay_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_extra_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_currency: Option<String>,
}

/// Query for GET /payment/
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<PaymentSortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

/// POST /auth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub address: String,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
}

/// POST /payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePayoutRequest {
    pub withdrawals: Vec<WithdrawalRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
}
