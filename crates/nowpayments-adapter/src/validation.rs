/*
[INPUT]:  Endpoint name and serialized request parameters
[OUTPUT]: Normalized payload or a Validation error
[POS]:    Input validation - runs before any network I/O
[UPDATE]: When endpoints gain parameters or constraints change
*/

use std::fmt::Debug;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{NowPaymentsError, Result};

/// Validates and normalizes request parameters per endpoint.
///
/// The client calls this before the retry policy; an `Err` short-circuits
/// the call without touching the network.
pub trait Validator: Send + Sync + Debug {
    fn validate(&self, method: &str, params: Value) -> Result<Value>;
}

/// Rules for the endpoints exposed by `NowPaymentsClient`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

const MAX_PAGE_LIMIT: u64 = 500;

impl Validator for DefaultValidator {
    fn validate(&self, method: &str, params: Value) -> Result<Value> {
        let Value::Object(mut map) = params else {
            return Err(NowPaymentsError::validation(
                method,
                "parameters must be a JSON object",
            ));
        };

        match method {
            "get_estimate_price" => {
                positive_amount(&map, "amount")?;
                currency(&mut map, "currency_from")?;
                currency(&mut map, "currency_to")?;
            }
            "get_min_amount" => {
                currency(&mut map, "currency_from")?;
                currency(&mut map, "currency_to")?;
            }
            "create_payment" => {
                positive_amount(&map, "price_amount")?;
                currency(&mut map, "price_currency")?;
                currency(&mut map, "pay_currency")?;
                if map.contains_key("pay_amount") {
                    positive_amount(&map, "pay_amount")?;
                }
                if map.contains_key("payout_currency") {
                    currency(&mut map, "payout_currency")?;
                }
                optional_url(&map, "ipn_callback_url")?;
            }
            "create_invoice" => {
                positive_amount(&map, "price_amount")?;
                currency(&mut map, "price_currency")?;
                if map.contains_key("pay_currency") {
                    currency(&mut map, "pay_currency")?;
                }
                for field in ["ipn_callback_url", "success_url", "cancel_url", "partially_paid_url"] {
                    optional_url(&map, field)?;
                }
            }
            "create_invoice_payment" => {
                identifier(&map, "iid")?;
                currency(&mut map, "pay_currency")?;
                if let Some(email) = map.get("customer_email").and_then(Value::as_str)
                    && !email.contains('@')
                {
                    return Err(NowPaymentsError::validation(
                        "customer_email",
                        "must be an email address",
                    ));
                }
            }
            "get_payment_status" | "update_payment_estimate" | "get_payout_status" => {
                identifier(&map, "id")?;
            }
            "list_payments" => {
                if let Some(limit) = map.get("limit") {
                    let limit = limit.as_u64().unwrap_or(0);
                    if limit == 0 || limit > MAX_PAGE_LIMIT {
                        return Err(NowPaymentsError::validation(
                            "limit",
                            format!("must be between 1 and {MAX_PAGE_LIMIT}"),
                        ));
                    }
                }
            }
            "authenticate" => {
                non_empty(&map, "email")?;
                non_empty(&map, "password")?;
            }
            "create_payout" => {
                let withdrawals = map
                    .get_mut("withdrawals")
                    .and_then(Value::as_array_mut)
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| {
                        NowPaymentsError::validation("withdrawals", "at least one withdrawal is required")
                    })?;
                for item in withdrawals.iter_mut() {
                    let Value::Object(withdrawal) = item else {
                        return Err(NowPaymentsError::validation(
                            "withdrawals",
                            "each withdrawal must be an object",
                        ));
                    };
                    non_empty(withdrawal, "address")?;
                    currency(withdrawal, "currency")?;
                    positive_amount(withdrawal, "amount")?;
                }
                optional_url(&map, "ipn_callback_url")?;
            }
            _ => {}
        }

        Ok(Value::Object(map))
    }
}

fn non_empty<'a>(map: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    match map.get(field).and_then(Value::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(NowPaymentsError::validation(field, "is required")),
    }
}

/// Currency tickers are case-insensitive upstream; the API expects lowercase
fn currency(map: &mut Map<String, Value>, field: &str) -> Result<()> {
    let normalized = non_empty(map, field)?.to_ascii_lowercase();
    if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(NowPaymentsError::validation(
            field,
            format!("`{normalized}` is not a valid currency ticker"),
        ));
    }
    map.insert(field.to_string(), Value::String(normalized));
    Ok(())
}

fn identifier(map: &Map<String, Value>, field: &str) -> Result<()> {
    let id = match map.get(field) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(NowPaymentsError::validation(field, "must be a non-empty id"));
    }
    Ok(())
}

fn positive_amount(map: &Map<String, Value>, field: &str) -> Result<()> {
    let amount = match map.get(field) {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    match amount {
        Some(amount) if amount > Decimal::ZERO => Ok(()),
        Some(_) => Err(NowPaymentsError::validation(field, "must be greater than zero")),
        None => Err(NowPaymentsError::validation(field, "must be a number")),
    }
}

fn optional_url(map: &Map<String, Value>, field: &str) -> Result<()> {
    let Some(value) = map.get(field).and_then(Value::as_str) else {
        return Ok(());
    };
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| NowPaymentsError::validation(field, format!("invalid URL: {err}")))
}
