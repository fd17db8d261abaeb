/*
[INPUT]:  Currency tickers and amounts
[OUTPUT]: API status, currency lists, price estimates and minimum amounts
[POS]:    HTTP layer - informational endpoints (API key only)
[UPDATE]: When adding new informational endpoints or changing response format
*/

use rust_decimal::Decimal;
use serde_json::json;

use crate::constants::endpoints;
use crate::http::client::query_pairs;
use crate::http::{ApiRequest, NowPaymentsClient, Result};
use crate::types::{
    ApiStatus, CurrenciesResponse, EstimatePrice, FullCurrenciesResponse, MerchantCoinsResponse,
    MinAmount,
};

impl NowPaymentsClient {
    /// Check API availability
    ///
    /// GET /status
    pub async fn get_status(&self) -> Result<ApiStatus> {
        self.send_json(ApiRequest::get(endpoints::STATUS)).await
    }

    /// List available pay currencies
    ///
    /// GET /currencies?fixed_rate={fixed_rate}
    pub async fn get_currencies(&self, fixed_rate: Option<bool>) -> Result<CurrenciesResponse> {
        let mut request = ApiRequest::get(endpoints::CURRENCIES);
        if let Some(fixed_rate) = fixed_rate {
            request = request.with_query(vec![("fixed_rate".to_string(), fixed_rate.to_string())]);
        }
        self.send_json(request).await
    }

    /// Detailed currency list
    ///
    /// GET /full-currencies
    pub async fn get_full_currencies(&self) -> Result<FullCurrenciesResponse> {
        self.send_json(ApiRequest::get(endpoints::FULL_CURRENCIES)).await
    }

    /// Currencies enabled in the merchant's account settings
    ///
    /// GET /merchant/coins
    pub async fn get_merchant_coins(&self) -> Result<MerchantCoinsResponse> {
        self.send_json(ApiRequest::get(endpoints::MERCHANT_COINS)).await
    }

    /// Estimated price of `amount` in `currency_to`
    ///
    /// GET /estimate?amount={amount}&currency_from={from}&currency_to={to}
    pub async fn get_estimate_price(
        &self,
        amount: Decimal,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<EstimatePrice> {
        let params = self.validated(
            "get_estimate_price",
            &json!({
                "amount": amount.to_string(),
                "currency_from": currency_from,
                "currency_to": currency_to,
            }),
        )?;
        let request = ApiRequest::get(endpoints::ESTIMATE).with_query(query_pairs(&params));
        self.send_json(request).await
    }

    /// Minimum payment amount for a currency pair
    ///
    /// GET /min-amount?currency_from={from}&currency_to={to}
    pub async fn get_min_amount(&self, currency_from: &str, currency_to: &str) -> Result<MinAmount> {
        let params = self.validated(
            "get_min_amount",
            &json!({
                "currency_from": currency_from,
                "currency_to": currency_to,
            }),
        )?;
        let request = ApiRequest::get(endpoints::MIN_AMOUNT).with_query(query_pairs(&params));
        self.send_json(request).await
    }
}
