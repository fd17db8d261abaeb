/*
[INPUT]:  Payment and invoice requests, payment ids, JWT for listing
[OUTPUT]: Payments, invoices and estimate updates
[POS]:    HTTP layer - payment endpoints
[UPDATE]: When adding new payment endpoints or changing request flow
*/

use serde_json::json;

use crate::constants::endpoints;
use crate::http::client::{field, query_pairs};
use crate::http::{ApiRequest, NowPaymentsClient, Result};
use crate::types::{
    CreateInvoiceRequest, CreatePaymentRequest, EstimateUpdate, Invoice, InvoicePaymentRequest,
    ListPaymentsQuery, Payment, PaymentList,
};

impl NowPaymentsClient {
    /// Create a payment
    ///
    /// POST /payment
    pub async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment> {
        let body = self.validated("create_payment", req)?;
        self.send_json(ApiRequest::post(endpoints::PAYMENT, body)).await
    }

    /// Create a hosted invoice
    ///
    /// POST /invoice
    pub async fn create_invoice(&self, req: &CreateInvoiceRequest) -> Result<Invoice> {
        let body = self.validated("create_invoice", req)?;
        self.send_json(ApiRequest::post(endpoints::INVOICE, body)).await
    }

    /// Create a payment against an existing invoice
    ///
    /// POST /invoice-payment
    pub async fn create_invoice_payment(&self, req: &InvoicePaymentRequest) -> Result<Payment> {
        let body = self.validated("create_invoice_payment", req)?;
        self.send_json(ApiRequest::post(endpoints::INVOICE_PAYMENT, body))
            .await
    }

    /// Current state of a payment
    ///
    /// GET /payment/{payment_id}
    pub async fn get_payment_status(&self, payment_id: &str) -> Result<Payment> {
        let params = self.validated("get_payment_status", &json!({ "id": payment_id }))?;
        let endpoint = format!("{}/{}", endpoints::PAYMENT, field(&params, "id"));
        self.send_json(ApiRequest::get(endpoint)).await
    }

    /// Paginated payment history
    ///
    /// GET /payment/?limit={limit}&page={page}&sortBy={sort_by}&orderBy={order_by}
    /// Requires: Authorization bearer token from `authenticate`
    pub async fn list_payments(&self, token: &str, query: &ListPaymentsQuery) -> Result<PaymentList> {
        let params = self.validated("list_payments", query)?;
        let request = ApiRequest::get(format!("{}/", endpoints::PAYMENT))
            .with_query(query_pairs(&params))
            .with_bearer(token);
        self.send_json(request).await
    }

    /// Refresh the pay amount of a fixed-rate payment
    ///
    /// POST /payment/{payment_id}/update-merchant-estimate
    pub async fn update_payment_estimate(&self, payment_id: &str) -> Result<EstimateUpdate> {
        let params = self.validated("update_payment_estimate", &json!({ "id": payment_id }))?;
        let endpoint = format!(
            "{}/{}/update-merchant-estimate",
            endpoints::PAYMENT,
            field(&params, "id")
        );
        self.send_json(ApiRequest::post(endpoint, json!({}))).await
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::NowPaymentsError;
    use crate::http::{ClientConfig, NowPaymentsClient};
    use crate::types::{
        CreateInvoiceRequest, CreatePaymentRequest, ListPaymentsQuery, PaymentStatus, SortOrder,
    };

    fn client_for(server: &MockServer) -> NowPaymentsClient {
        NowPaymentsClient::with_config(ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::new("test-key")
        })
        .expect("client init")
    }

    #[tokio::test]
    async fn test_create_payment_posts_normalized_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .and(body_json(serde_json::json!({
                "price_amount": 3999.5,
                "price_currency": "usd",
                "pay_currency": "btc",
                "order_id": "RGDBP-21314"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "payment_id": "5745459419",
                "payment_status": "waiting",
                "pay_address": "3EZ2uTdVDAMFXTfc6uLDDKR6o8qKBZXVkj",
                "price_amount": 3999.5,
                "price_currency": "usd",
                "pay_amount": 0.17070286,
                "pay_currency": "btc",
                "order_id": "RGDBP-21314",
                "created_at": "2020-12-22T15:00:22.742Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = CreatePaymentRequest::new(Decimal::from_str("3999.5").unwrap(), "USD", "BTC");
        req.order_id = Some("RGDBP-21314".to_string());

        let payment = client_for(&server)
            .create_payment(&req)
            .await
            .expect("create_payment failed");
        assert_eq!(payment.payment_id, "5745459419");
        assert_eq!(payment.payment_status, PaymentStatus::Waiting);
    }

    #[tokio::test]
    async fn test_invalid_payment_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let req = CreatePaymentRequest::new(Decimal::ZERO, "usd", "btc");
        let err = client_for(&server).create_payment(&req).await.unwrap_err();
        assert!(matches!(err, NowPaymentsError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_invoice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "4522625843",
                "order_id": "RGDBP-21314",
                "price_amount": "1000",
                "price_currency": "usd",
                "invoice_url": "https://nowpayments.io/payment/?iid=4522625843",
                "created_at": "2020-12-22T15:05:58.290Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let invoice = client_for(&server)
            .create_invoice(&CreateInvoiceRequest::new(Decimal::from(1000), "usd"))
            .await
            .expect("create_invoice failed");
        assert_eq!(invoice.id, "4522625843");
        assert!(invoice.invoice_url.contains("iid=4522625843"));
    }

    #[tokio::test]
    async fn test_get_payment_status_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payment/42"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": false,
                "statusCode": 404,
                "code": "PAYMENT_NOT_FOUND",
                "message": "Payment not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).get_payment_status("42").await.unwrap_err();
        match err {
            NowPaymentsError::Api {
                status, code, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code.as_deref(), Some("PAYMENT_NOT_FOUND"));
                assert_eq!(message, "Payment not found");
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_payments_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payment/"))
            .and(header("authorization", "Bearer jwt-token"))
            .and(query_param("limit", "5"))
            .and(query_param("orderBy", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [],
                "limit": 5,
                "page": 0,
                "pagesCount": 0,
                "total": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ListPaymentsQuery {
            limit: Some(5),
            order_by: Some(SortOrder::Asc),
            ..Default::default()
        };
        let list = client_for(&server)
            .list_payments("jwt-token", &query)
            .await
            .expect("list_payments failed");
        assert!(list.data.is_empty());
    }
}
