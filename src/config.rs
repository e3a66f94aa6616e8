//! Environment-driven configuration (§4.N, §6), mirroring the control flow
//! of the teacher's own `Config::from_env()`.

use std::env;

use crate::domain::error::ConfigError;
use crate::domain::types::{Commitment, Network};

pub struct Config {
    pub host: String,
    pub port: u16,
    pub rpc_url: String,
    pub network: Network,
    pub commitment: Commitment,
    pub usdc_mint: String,
    pub recipient_wallet: String,
    pub resource_price_usd: f64,
    pub resource_timeout_seconds: u32,
    /// `None` selects the in-process replay cache and webhook queue backings.
    pub shared_store_url: Option<String>,
    pub replay_ttl_seconds: u64,
    pub webhook_signing_secret: Option<String>,
    pub webhook_log_capacity: usize,
    pub max_verification_retries: u32,
    pub allow_overpayment: bool,
    pub strict_mint_check: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .map(|p| p.parse().map_err(|_| ConfigError::Invalid { field: "PORT".to_string(), reason: p }))
            .transpose()?
            .unwrap_or(3000);

        let rpc_url = env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());

        let network = env::var("SOLANA_NETWORK")
            .ok()
            .and_then(|n| crate::currency::normalize_network(&n))
            .unwrap_or(Network::Devnet);

        let commitment = match env::var("SOLANA_COMMITMENT").as_deref() {
            Ok("processed") => Commitment::Processed,
            Ok("finalized") => Commitment::Finalized,
            _ => Commitment::Confirmed,
        };

        let usdc_mint = env::var("USDC_MINT")
            .unwrap_or_else(|_| "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_string());

        let recipient_wallet =
            env::var("RECIPIENT_WALLET").map_err(|_| ConfigError::Missing("RECIPIENT_WALLET".to_string()))?;

        let resource_price_usd = env::var("RESOURCE_PRICE_USD")
            .ok()
            .map(|p| {
                p.parse::<f64>().map_err(|_| ConfigError::Invalid {
                    field: "RESOURCE_PRICE_USD".to_string(),
                    reason: p,
                })
            })
            .transpose()?
            .unwrap_or(0.01);

        let resource_timeout_seconds = env::var("RESOURCE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(120);

        let shared_store_url = env::var("SHARED_STORE_URL").ok().filter(|s| !s.is_empty());

        let replay_ttl_seconds =
            env::var("REPLAY_TTL_SECONDS").ok().and_then(|t| t.parse().ok()).unwrap_or(3_600);

        let webhook_signing_secret = env::var("WEBHOOK_SIGNING_SECRET").ok().filter(|s| !s.is_empty());

        let webhook_log_capacity =
            env::var("WEBHOOK_LOG_CAPACITY").ok().and_then(|c| c.parse().ok()).unwrap_or(1_000);

        let max_verification_retries =
            env::var("MAX_VERIFICATION_RETRIES").ok().and_then(|r| r.parse().ok()).unwrap_or(3);

        let allow_overpayment =
            env::var("ALLOW_OVERPAYMENT").map(|v| v == "true" || v == "1").unwrap_or(false);

        let strict_mint_check =
            env::var("STRICT_MINT_CHECK").map(|v| v == "true" || v == "1").unwrap_or(true);

        Ok(Self {
            host,
            port,
            rpc_url,
            network,
            commitment,
            usdc_mint,
            recipient_wallet,
            resource_price_usd,
            resource_timeout_seconds,
            shared_store_url,
            replay_ttl_seconds,
            webhook_signing_secret,
            webhook_log_capacity,
            max_verification_retries,
            allow_overpayment,
            strict_mint_check,
        })
    }
}
