//! # Backend Client
//!
//! HTTP client for the backend's wallet endpoints, used to enrich the wallet
//! session with token balances.

use crate::core::error::{FabricError, Result};
use crate::core::service::BalanceEnricher;
use crate::wallet::TokenBalance;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::dto::Chain;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3001";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One token row as returned by `/api/wallet/tokens`.
///
/// `amount` is the raw integer amount as a string. Older backends only send
/// `uiAmount`, a decimal string in whole tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceDto {
    pub mint: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub ui_amount: Option<String>,
    pub decimals: u8,
}

impl TokenBalanceDto {
    /// Convert to smallest units. Rows whose amount cannot be represented
    /// exactly are rejected.
    pub fn into_balance(self) -> Result<TokenBalance> {
        let raw = match (&self.amount, &self.ui_amount) {
            (Some(amount), _) => amount.trim().parse::<u128>().ok(),
            (None, Some(ui)) => parse_ui_amount(ui, self.decimals),
            (None, None) => None,
        }
        .ok_or_else(|| {
            FabricError::Validation(format!("unusable amount for token {}", self.mint))
        })?;

        Ok(TokenBalance {
            mint: self.mint,
            symbol: self.symbol,
            raw,
            decimals: self.decimals,
        })
    }
}

/// Parse a decimal string such as `"12.5"` into smallest units without going
/// through floating point. Fails on more fractional digits than `decimals`.
pub fn parse_ui_amount(value: &str, decimals: u8) -> Option<u128> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) || !digits(fraction) {
        return None;
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return None;
    }

    let scale = 10u128.checked_pow(decimals as u32)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction_raw: u128 = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.checked_pow((decimals as usize - fraction.len()) as u32)?;
        fraction.parse::<u128>().ok()?.checked_mul(padding)?
    };
    whole.checked_mul(scale)?.checked_add(fraction_raw)
}

/// HTTP client for the backend API server.
///
/// Configured with a 10 second timeout so a slow backend cannot hold up a
/// balance refresh beyond the wallet's own budget.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL from `API_BASE_URL`.
    pub fn from_env() -> Self {
        Self::new(
            lib_utils::get_env("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn token_balance_rows(&self, address: &str, chain: Chain) -> Result<Vec<TokenBalanceDto>> {
        let url = format!("{}/api/wallet/tokens", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("address", address), ("chain", chain.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FabricError::Http(format!(
                "Failed to fetch token balances: {}",
                status
            )));
        }
        Ok(response.json::<Vec<TokenBalanceDto>>().await?)
    }
}

#[async_trait]
impl BalanceEnricher for BackendClient {
    async fn token_balances(&self, address: &str, chain: Chain) -> Result<Vec<TokenBalance>> {
        let rows = self.token_balance_rows(address, chain).await?;
        let mut balances = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_balance() {
                Ok(balance) => balances.push(balance),
                Err(e) => tracing::warn!(error = %e, "Skipping token balance row"),
            }
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ui_amount() {
        assert_eq!(parse_ui_amount("12.5", 6), Some(12_500_000));
        assert_eq!(parse_ui_amount("0.000001", 6), Some(1));
        assert_eq!(parse_ui_amount("3", 9), Some(3_000_000_000));
        assert_eq!(parse_ui_amount(".5", 1), Some(5));
        assert_eq!(parse_ui_amount("1.2500", 2), Some(125));
        assert_eq!(parse_ui_amount("0.0000001", 6), None);
        assert_eq!(parse_ui_amount("-1", 6), None);
        assert_eq!(parse_ui_amount("1e5", 6), None);
        assert_eq!(parse_ui_amount("", 6), None);
    }

    #[test]
    fn test_dto_prefers_raw_amount() {
        let dto: TokenBalanceDto = serde_json::from_value(json!({
            "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "symbol": "USDC",
            "amount": "2500000",
            "uiAmount": "999",
            "decimals": 6
        }))
        .unwrap();
        let balance = dto.into_balance().unwrap();
        assert_eq!(balance.raw, 2_500_000);
        assert_eq!(balance.ui_amount(), 2.5);
        assert_eq!(balance.symbol.as_deref(), Some("USDC"));
    }

    #[test]
    fn test_dto_falls_back_to_ui_amount() {
        let dto: TokenBalanceDto = serde_json::from_value(json!({
            "mint": "So11111111111111111111111111111111111111112",
            "uiAmount": "1.5",
            "decimals": 9
        }))
        .unwrap();
        assert_eq!(dto.into_balance().unwrap().raw, 1_500_000_000);
    }

    #[test]
    fn test_dto_without_amount_is_rejected() {
        let dto: TokenBalanceDto =
            serde_json::from_value(json!({"mint": "abc", "decimals": 6})).unwrap();
        assert!(matches!(dto.into_balance(), Err(FabricError::Validation(_))));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = BackendClient::new("http://localhost:3001/");
        assert_eq!(client.base_url(), "http://localhost:3001");
    }
}
