use crate::{
    error::{
        GENERIC_SETTLEMENT_FAILURE,
        SettlementError,
    },
    types::{
        WagerRequest,
        WagerResult,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use rust_decimal::Decimal;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    future::Future,
    time::Duration,
};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://coinflip-backend-1.onrender.com";

/// Remote authority that owns balances and decides wagers.
///
/// Implementations never retry; a failed call is reported once and the
/// player may try again.
pub trait SettlementClient {
    fn fetch_balance(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Decimal, SettlementError>> + Send;

    fn submit_wager(
        &self,
        request: &WagerRequest,
    ) -> impl Future<Output = Result<WagerResult, SettlementError>> + Send;
}

#[derive(Clone)]
pub struct HttpSettlementClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct BalanceRequestDto<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct BalanceDto {
    #[serde(with = "rust_decimal::serde::float")]
    wallet_balance: Decimal,
}

impl HttpSettlementClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .wrap_err("failed to build HTTP client for settlement authority")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, SettlementError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "settlement request");
        let res = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| SettlementError::Transport(transport_message(&err)))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|err| SettlementError::Transport(transport_message(&err)))?;
        interpret_body(status.is_success(), &bytes)
    }
}

impl SettlementClient for HttpSettlementClient {
    async fn fetch_balance(&self, user_id: &str) -> Result<Decimal, SettlementError> {
        let body = self
            .post_json("/api/get-balance", &BalanceRequestDto { user_id })
            .await?;
        let dto: BalanceDto = serde_json::from_value(body)
            .map_err(|err| SettlementError::Malformed(err.to_string()))?;
        if dto.wallet_balance < Decimal::ZERO {
            return Err(SettlementError::Malformed(format!(
                "negative wallet balance {}",
                dto.wallet_balance
            )));
        }
        Ok(dto.wallet_balance)
    }

    async fn submit_wager(
        &self,
        request: &WagerRequest,
    ) -> Result<WagerResult, SettlementError> {
        let body = self.post_json("/api/bet", request).await?;
        let result: WagerResult = serde_json::from_value(body)
            .map_err(|err| SettlementError::Malformed(err.to_string()))?;
        Ok(result)
    }
}

/// A non-2xx status and an `error` field are the same failure; the message is
/// taken from the body when present.
fn interpret_body(success: bool, bytes: &[u8]) -> Result<Value, SettlementError> {
    let parsed = serde_json::from_slice::<Value>(bytes);
    let error_message = parsed.as_ref().ok().and_then(|body| {
        body.get("error")
            .filter(|e| !e.is_null())
            .map(|e| match e {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::String(_) => GENERIC_SETTLEMENT_FAILURE.to_string(),
                other => other.to_string(),
            })
    });
    if let Some(message) = error_message {
        return Err(SettlementError::Rejected(message));
    }
    if !success {
        return Err(SettlementError::Transport(
            GENERIC_SETTLEMENT_FAILURE.to_string(),
        ));
    }
    parsed.map_err(|_| {
        SettlementError::Transport("Invalid response from server".to_string())
    })
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out".to_string()
    } else if err.is_connect() {
        "Could not reach server".to_string()
    } else {
        GENERIC_SETTLEMENT_FAILURE.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn interpret_body__error_field_wins_over_status() {
        let body = br#"{"error":"insufficient funds"}"#;
        assert_eq!(
            interpret_body(true, body),
            Err(SettlementError::Rejected("insufficient funds".into()))
        );
        assert_eq!(
            interpret_body(false, body),
            Err(SettlementError::Rejected("insufficient funds".into()))
        );
    }

    #[test]
    fn interpret_body__non_success_without_message_uses_fallback() {
        assert_eq!(
            interpret_body(false, b"<html>bad gateway</html>"),
            Err(SettlementError::Transport(GENERIC_SETTLEMENT_FAILURE.into()))
        );
        assert_eq!(
            interpret_body(false, br#"{"detail":"nope"}"#),
            Err(SettlementError::Transport(GENERIC_SETTLEMENT_FAILURE.into()))
        );
    }

    #[test]
    fn interpret_body__non_json_success_is_transport_failure() {
        assert!(matches!(
            interpret_body(true, b"ok"),
            Err(SettlementError::Transport(_))
        ));
    }
}
