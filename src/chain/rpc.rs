//! Minimal Solana JSON-RPC client issuing exactly the two query kinds this
//! toolkit depends on (§4.M, §6): `getTransaction` and `getTokenAccountBalance`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::RpcError;
use crate::domain::types::Commitment;
use crate::domain::traits::RpcClient;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// ============================================================================
// Response shapes — precisely the fields §4.B and §4.C consume, no more.
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub slot: u64,
    pub transaction: TransactionData,
    pub meta: TransactionMeta,
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionData {
    pub message: TransactionMessage,
    pub signatures: Vec<String>,
}

/// Static account keys and instruction list, whichever of the legacy or
/// versioned message shapes the RPC returned under the `json` encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub account_keys: Vec<String>,
    pub instructions: Vec<InstructionData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionData {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    /// Base58-encoded instruction data.
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstructionSet {
    pub index: u8,
    pub instructions: Vec<InstructionData>,
}

/// Accounts loaded from on-chain address-lookup tables for a versioned
/// transaction; appended after `account_keys` when resolving indices.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructionSet>>,
    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    pub ui_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenAccountBalanceValue {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct TokenAccountBalanceResult {
    value: Option<TokenAccountBalanceValue>,
}

/// Thin `reqwest`-backed JSON-RPC client. Every call is a single attempt;
/// callers wrap it in [`crate::retry::with_retry`] to get the classified
/// backoff behavior §4.D requires.
pub struct HttpRpcClient {
    rpc_url: String,
    http: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_client(rpc_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self { rpc_url: rpc_url.into(), http }
    }

    async fn call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<Option<R>, RpcError> {
        let request = JsonRpcRequest { jsonrpc: "2.0", id: 1, method, params };

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(RpcError::Remote(format!("{} ({})", err.message, err.code)));
        }

        Ok(body.result)
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<TransactionResponse>, RpcError> {
        let params = serde_json::json!([
            signature,
            {
                "encoding": "json",
                "commitment": commitment.as_str(),
                "maxSupportedTransactionVersion": 0,
            }
        ]);
        self.call("getTransaction", params).await
    }

    async fn get_token_account_balance(&self, address: &str) -> Result<Option<u64>, RpcError> {
        let params = serde_json::json!([address]);
        let result: Option<TokenAccountBalanceResult> =
            self.call("getTokenAccountBalance", params).await?;
        Ok(result
            .and_then(|r| r.value)
            .and_then(|v| v.amount.parse::<u64>().ok()))
    }
}
