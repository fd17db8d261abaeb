/*
[INPUT]:  Account credentials, payout batches, payout ids
[OUTPUT]: JWT tokens, balances and payout state
[POS]:    HTTP layer - custody endpoints (payouts require a JWT bearer)
[UPDATE]: When adding custody endpoints or changing the auth flow
*/

use serde_json::json;

use crate::constants::endpoints;
use crate::http::client::field;
use crate::http::{ApiRequest, NowPaymentsClient, Result};
use crate::types::{AuthRequest, AuthToken, Balances, CreatePayoutRequest, Payout, Withdrawal};

impl NowPaymentsClient {
    /// Exchange account credentials for a short-lived JWT
    ///
    /// POST /auth
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthToken> {
        let req = AuthRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let body = self.validated("authenticate", &req)?;
        self.send_json(ApiRequest::post(endpoints::AUTH, body)).await
    }

    /// Custody balances per currency
    ///
    /// GET /balance
    pub async fn get_balance(&self) -> Result<Balances> {
        self.send_json(ApiRequest::get(endpoints::BALANCE)).await
    }

    /// Create a payout batch
    ///
    /// POST /payout
    /// Requires: Authorization bearer token from `authenticate`
    pub async fn create_payout(&self, token: &str, req: &CreatePayoutRequest) -> Result<Payout> {
        let body = self.validated("create_payout", req)?;
        let request = ApiRequest::post(endpoints::PAYOUT, body).with_bearer(token);
        self.send_json(request).await
    }

    /// Withdrawals belonging to a payout batch
    ///
    /// GET /payout/{payout_id}
    pub async fn get_payout_status(&self, payout_id: &str) -> Result<Vec<Withdrawal>> {
        let params = self.validated("get_payout_status", &json!({ "id": payout_id }))?;
        let endpoint = format!("{}/{}", endpoints::PAYOUT, field(&params, "id"));
        self.send_json(ApiRequest::get(endpoint)).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::NowPaymentsError;
    use crate::http::{ClientConfig, NowPaymentsClient};
    use crate::types::{CreatePayoutRequest, PayoutStatus, WithdrawalRequest};

    fn client_for(server: &MockServer) -> NowPaymentsClient {
        NowPaymentsClient::with_config(ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::new("test-key")
        })
        .expect("client init")
    }

    #[tokio::test]
    async fn test_authenticate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(body_json(serde_json::json!({
                "email": "merchant@example.com",
                "password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.test.signature"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .authenticate("merchant@example.com", "hunter2")
            .await
            .expect("authenticate failed");
        assert!(token.token.starts_with("eyJ"));
    }

    #[tokio::test]
    async fn test_create_payout_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payout"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "5000000713",
                "withdrawals": [{
                    "id": "5000000000",
                    "address": "TEmGwPeRTPiLFLVfBxXkSP91yc5GMNQhfS",
                    "currency": "trx",
                    "amount": "200",
                    "batch_withdrawal_id": "5000000713",
                    "status": "WAITING",
                    "createdAt": "2020-11-12T17:06:12.791Z"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let req = CreatePayoutRequest {
            withdrawals: vec![WithdrawalRequest {
                address: "TEmGwPeRTPiLFLVfBxXkSP91yc5GMNQhfS".to_string(),
                currency: "TRX".to_string(),
                amount: Decimal::from(200),
                extra_id: None,
                ipn_callback_url: None,
            }],
            ipn_callback_url: None,
        };

        let payout = client_for(&server)
            .create_payout("jwt", &req)
            .await
            .expect("create_payout failed");
        assert_eq!(payout.id, "5000000713");
        assert_eq!(payout.withdrawals[0].status, PayoutStatus::Waiting);
    }

    #[tokio::test]
    async fn test_unauthorized_payout_is_surfaced_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payout/5000000713"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status": false,
                "statusCode": 401,
                "code": "AUTH_REQUIRED",
                "message": "Authorization header is empty (Bearer JWTtoken is required)"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_payout_status("5000000713")
            .await
            .unwrap_err();
        assert!(matches!(err, NowPaymentsError::Api { status: 401, .. }));
        assert!(!err.is_retryable());
    }
}
