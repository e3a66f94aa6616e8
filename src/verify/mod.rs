//! Verification orchestrator (§4.F): the state machine that turns a proof
//! into a verdict, driving the header codec, replay cache, RPC client,
//! parser, and matcher in order.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chain::parse_transfers;
use crate::domain::error::VerificationErrorCode;
use crate::domain::traits::{ReplayCacheBacking, RetryClassifier, RpcClient};
use crate::domain::types::{Commitment, ParsedTransfer, ReplayCacheEntry, VerificationVerdict};
use crate::header;
use crate::matcher::{match_transfer, MatchOptions, MatchOutcome, MatchRequest};
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub expected_recipient: String,
    pub expected_mint: String,
    pub required_smallest_unit: u64,
    pub commitment: Commitment,
    pub match_options: MatchOptions,
    pub retry_policy: RetryPolicy,
    /// How stale a transaction's `block_time` may be, in seconds, before
    /// it's rejected as expired. `None` disables the check.
    pub max_age_seconds: Option<i64>,
}

pub struct Orchestrator {
    rpc: Arc<dyn RpcClient>,
    replay_cache: Arc<dyn ReplayCacheBacking>,
    classifier: Arc<dyn RetryClassifier>,
}

impl Orchestrator {
    pub fn new(
        rpc: Arc<dyn RpcClient>,
        replay_cache: Arc<dyn ReplayCacheBacking>,
        classifier: Arc<dyn RetryClassifier>,
    ) -> Self {
        Self { rpc, replay_cache, classifier }
    }

    /// The protocol-level entry point: decodes the `X-PAYMENT` header, then
    /// delegates to [`Self::verify`].
    pub async fn verify_header(
        &self,
        header_value: &str,
        options: &VerifyOptions,
    ) -> VerificationVerdict {
        let proof = match header::decode_proof(header_value) {
            Ok(proof) => proof,
            Err(error) => {
                warn!(%error, "rejecting malformed X-PAYMENT header");
                return VerificationVerdict::invalid(
                    VerificationErrorCode::InvalidHeader,
                    error.to_string(),
                );
            }
        };

        let signature = match header::resolve_signature(&proof) {
            Ok(signature) => signature,
            Err(error) => {
                warn!(%error, "rejecting unresolvable X-PAYMENT proof");
                return VerificationVerdict::invalid(
                    VerificationErrorCode::InvalidHeader,
                    error.to_string(),
                );
            }
        };

        self.verify(&signature, options).await
    }

    /// The low-level entry point: verifies a transaction signature directly.
    pub async fn verify(&self, signature: &str, options: &VerifyOptions) -> VerificationVerdict {
        debug!(signature, "verification: CheckReplay");
        match self.replay_cache.is_used(signature).await {
            Ok(true) => {
                warn!(signature, "verification: replay detected");
                return VerificationVerdict::invalid(
                    VerificationErrorCode::ReplayAttack,
                    "this payment signature has already been consumed",
                );
            }
            Ok(false) => {}
            Err(error) => {
                warn!(signature, %error, "replay cache unavailable, failing open on read");
            }
        }

        debug!(signature, "verification: FetchTx");
        let classifier = self.classifier.as_ref();
        let fetch = with_retry(&options.retry_policy, classifier, || {
            self.rpc.get_transaction(signature, options.commitment)
        })
        .await;

        let transaction = match fetch {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                info!(signature, "verification: transaction not found");
                return VerificationVerdict::invalid(
                    VerificationErrorCode::TxNotFound,
                    "transaction not found",
                );
            }
            Err(error) => {
                warn!(signature, %error, "verification: rpc failed");
                return VerificationVerdict::invalid(
                    VerificationErrorCode::TxNotFound,
                    format!("failed to fetch transaction: {error}"),
                );
            }
        };

        debug!(signature, "verification: CheckTxError");
        if transaction.meta.err.is_some() {
            return VerificationVerdict::invalid(
                VerificationErrorCode::TxFailed,
                "transaction executed with an error",
            );
        }

        debug!(signature, "verification: CheckTiming");
        if let Some(max_age) = options.max_age_seconds {
            match transaction.block_time {
                Some(block_time) => {
                    let now = chrono::Utc::now().timestamp();
                    if now - block_time > max_age {
                        return VerificationVerdict::invalid(
                            VerificationErrorCode::TxExpired,
                            format!("transaction is older than the allowed {max_age}s window"),
                        );
                    }
                }
                None => {
                    warn!(signature, "verification: block_time missing, cannot check max age");
                    return VerificationVerdict::invalid(
                        VerificationErrorCode::VerificationError,
                        "transaction has no block timestamp to check against the configured max age",
                    );
                }
            }
        }

        debug!(signature, "verification: ParseTransfers");
        let transfers: Vec<ParsedTransfer> = parse_transfers(&transaction);

        debug!(signature, "verification: MatchTransfer");
        let request = MatchRequest {
            transfers: &transfers,
            expected_recipient: &options.expected_recipient,
            expected_mint: &options.expected_mint,
            required_smallest_unit: options.required_smallest_unit,
            options: options.match_options,
        };

        let transfer = match match_transfer(&request) {
            MatchOutcome::Matched(transfer) => transfer,
            MatchOutcome::Rejected { code, observed } => {
                info!(signature, ?code, "verification: no matching transfer");
                return VerificationVerdict::invalid_with_debug(
                    code,
                    rejection_message(code),
                    serde_json::json!({ "observed": observed }),
                );
            }
        };

        debug!(signature, "verification: ConsumeReplay");
        let entry = ReplayCacheEntry {
            recipient: transfer.destination.clone(),
            amount: transfer.amount,
            consumed_at_ms: chrono::Utc::now().timestamp_millis(),
            payer: Some(transfer.authority.clone()),
        };
        if let Err(error) = self.replay_cache.mark_used(signature, entry).await {
            warn!(signature, %error, "verification: failed to consume replay slot");
            return VerificationVerdict::invalid(
                VerificationErrorCode::ReplayAttack,
                "unable to record this payment as consumed",
            );
        }

        info!(signature, amount = transfer.amount, "verification: Emit Valid");
        VerificationVerdict::Valid {
            signature: signature.to_string(),
            transfer,
            block_time: transaction.block_time,
            slot: Some(transaction.slot),
        }
    }

    /// Verifies N signatures concurrently, independently of one another.
    pub async fn verify_batch(
        &self,
        signatures: &[String],
        options: &VerifyOptions,
    ) -> Vec<VerificationVerdict> {
        let mut set = tokio::task::JoinSet::new();
        for (index, signature) in signatures.iter().cloned().enumerate() {
            let rpc = self.rpc.clone();
            let replay_cache = self.replay_cache.clone();
            let classifier = self.classifier.clone();
            let options = options.clone();
            set.spawn(async move {
                let orchestrator = Orchestrator::new(rpc, replay_cache, classifier);
                (index, orchestrator.verify(&signature, &options).await)
            });
        }

        let mut results: Vec<Option<VerificationVerdict>> = (0..signatures.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            if let Ok((index, verdict)) = joined {
                results[index] = Some(verdict);
            }
        }

        results
            .into_iter()
            .map(|v| {
                v.unwrap_or_else(|| {
                    VerificationVerdict::invalid(
                        VerificationErrorCode::VerificationError,
                        "verification task failed unexpectedly",
                    )
                })
            })
            .collect()
    }
}

fn rejection_message(code: VerificationErrorCode) -> &'static str {
    match code {
        VerificationErrorCode::NoUsdcTransfer => "transaction contains no recognizable token transfer",
        VerificationErrorCode::TransferMismatch => "no transfer to the expected recipient was found",
        VerificationErrorCode::InsufficientAmount => "transfer amount does not satisfy the requirement",
        VerificationErrorCode::WrongToken => "transfer uses an unexpected mint",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{CacheError, RpcError};
    use crate::domain::traits::DefaultRetryClassifier;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockReplayCache {
        used: Mutex<std::collections::HashSet<String>>,
    }

    impl MockReplayCache {
        fn new() -> Self {
            Self { used: Mutex::new(std::collections::HashSet::new()) }
        }
    }

    #[async_trait]
    impl ReplayCacheBacking for MockReplayCache {
        async fn is_used(&self, signature: &str) -> Result<bool, CacheError> {
            Ok(self.used.lock().unwrap().contains(signature))
        }
        async fn mark_used(&self, signature: &str, _entry: ReplayCacheEntry) -> Result<(), CacheError> {
            self.used.lock().unwrap().insert(signature.to_string());
            Ok(())
        }
        async fn get_meta(&self, _signature: &str) -> Result<Option<ReplayCacheEntry>, CacheError> {
            Ok(None)
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    struct MockRpc {
        response: crate::chain::TransactionResponse,
    }

    #[async_trait]
    impl RpcClient for MockRpc {
        async fn get_transaction(
            &self,
            _signature: &str,
            _commitment: Commitment,
        ) -> Result<Option<crate::chain::TransactionResponse>, RpcError> {
            Ok(Some(self.response.clone()))
        }
        async fn get_token_account_balance(&self, _address: &str) -> Result<Option<u64>, RpcError> {
            Ok(None)
        }
    }

    fn valid_tx() -> crate::chain::TransactionResponse {
        use crate::chain::rpc::{InstructionData, TransactionData, TransactionMessage, TransactionMeta};
        let mut bytes = vec![3u8];
        bytes.extend_from_slice(&1_000u64.to_le_bytes());
        let data = bs58::encode(bytes).into_string();
        crate::chain::rpc::TransactionResponse {
            slot: 1,
            transaction: TransactionData {
                message: TransactionMessage {
                    account_keys: vec![
                        "Source1111111111111111111111111111111111".to_string(),
                        "Recipient111111111111111111111111111111".to_string(),
                        "Authority111111111111111111111111111111111".to_string(),
                        "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".to_string(),
                    ],
                    instructions: vec![InstructionData { program_id_index: 3, accounts: vec![0, 1, 2], data }],
                },
                signatures: vec!["sig".to_string()],
            },
            meta: TransactionMeta {
                err: None,
                pre_token_balances: None,
                post_token_balances: None,
                inner_instructions: None,
                loaded_addresses: None,
            },
            block_time: Some(chrono::Utc::now().timestamp()),
        }
    }

    fn options() -> VerifyOptions {
        VerifyOptions {
            expected_recipient: "Recipient111111111111111111111111111111".to_string(),
            expected_mint: "unknown".to_string(),
            required_smallest_unit: 1_000,
            commitment: Commitment::Confirmed,
            match_options: MatchOptions::default(),
            retry_policy: RetryPolicy { max_retries: 0, base_delay_ms: 1, max_delay_ms: 1, ..Default::default() },
            max_age_seconds: None,
        }
    }

    #[tokio::test]
    async fn valid_transaction_produces_a_valid_verdict() {
        let orchestrator = Orchestrator::new(
            Arc::new(MockRpc { response: valid_tx() }),
            Arc::new(MockReplayCache::new()),
            Arc::new(DefaultRetryClassifier),
        );
        let verdict = orchestrator.verify("sig", &options()).await;
        assert!(verdict.is_valid());
    }

    #[tokio::test]
    async fn replayed_signature_is_rejected() {
        let cache = Arc::new(MockReplayCache::new());
        cache.mark_used("sig", ReplayCacheEntry {
            recipient: "R".to_string(),
            amount: 1,
            consumed_at_ms: 0,
            payer: None,
        }).await.unwrap();

        let orchestrator =
            Orchestrator::new(Arc::new(MockRpc { response: valid_tx() }), cache, Arc::new(DefaultRetryClassifier));
        let verdict = orchestrator.verify("sig", &options()).await;
        assert_eq!(verdict.code(), Some(VerificationErrorCode::ReplayAttack));
    }

    #[tokio::test]
    async fn failed_transaction_is_rejected_as_tx_failed() {
        let mut tx = valid_tx();
        tx.meta.err = Some(serde_json::json!({"InstructionError": [0, "Custom"]}));
        let orchestrator = Orchestrator::new(
            Arc::new(MockRpc { response: tx }),
            Arc::new(MockReplayCache::new()),
            Arc::new(DefaultRetryClassifier),
        );
        let verdict = orchestrator.verify("sig", &options()).await;
        assert_eq!(verdict.code(), Some(VerificationErrorCode::TxFailed));
    }
}
