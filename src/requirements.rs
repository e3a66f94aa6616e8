//! Payment requirements generator (§4.G): turns a price and a recipient
//! wallet into the `accepts` entries of a 402 response body.

use spl_associated_token_account::get_associated_token_address;

use crate::currency::{network_to_wire, usd_to_smallest_unit};
use crate::domain::types::{Network, PayTo, PaymentDescriptor, PaymentRequirements};

const X402_VERSION: u32 = 1;
const DEFAULT_ERROR_MESSAGE: &str = "X-PAYMENT header is required";

pub struct RequirementsGenerator {
    pub network: Network,
    pub mint: String,
    pub timeout_seconds: u32,
}

pub struct PriceRequest {
    pub recipient_wallet: String,
    pub price_usd: f64,
    pub resource: Option<String>,
    pub description: String,
}

impl RequirementsGenerator {
    pub fn new(network: Network, mint: String, timeout_seconds: u32) -> Self {
        Self { network, mint, timeout_seconds }
    }

    /// Derives the recipient's associated token account and builds a single
    /// `accepts` descriptor. Rejects a non-positive price.
    pub fn generate(&self, request: &PriceRequest) -> Result<PaymentRequirements, String> {
        if request.price_usd <= 0.0 {
            return Err(format!("price must be positive, got {}", request.price_usd));
        }
        let amount = usd_to_smallest_unit(request.price_usd)?;
        let recipient_ata = self.derive_ata(&request.recipient_wallet)?;

        let descriptor = PaymentDescriptor {
            scheme: "exact".to_string(),
            network: network_to_wire(self.network),
            max_amount_required: amount.to_string(),
            resource: request.resource.clone(),
            description: request.description.clone(),
            pay_to: PayTo { address: recipient_ata, asset: self.mint.clone() },
            timeout: self.timeout_seconds,
        };

        Ok(PaymentRequirements {
            x402_version: X402_VERSION,
            accepts: vec![descriptor],
            error: DEFAULT_ERROR_MESSAGE.to_string(),
        })
    }

    /// Builds one `PaymentRequirements` body per request, independently.
    pub fn generate_multiple(
        &self,
        requests: &[PriceRequest],
    ) -> Result<Vec<PaymentRequirements>, String> {
        requests.iter().map(|r| self.generate(r)).collect()
    }

    fn derive_ata(&self, wallet: &str) -> Result<String, String> {
        let owner: solana_sdk::pubkey::Pubkey = wallet
            .parse()
            .map_err(|_| format!("invalid wallet address: {wallet}"))?;
        let mint: solana_sdk::pubkey::Pubkey = self
            .mint
            .parse()
            .map_err(|_| format!("invalid mint address: {}", self.mint))?;
        Ok(get_associated_token_address(&owner, &mint).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> RequirementsGenerator {
        RequirementsGenerator::new(
            Network::Devnet,
            "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_string(),
            120,
        )
    }

    #[test]
    fn generate_derives_ata_and_converts_price() {
        let r#gen = generator();
        let requirements = r#gen
            .generate(&PriceRequest {
                recipient_wallet: "11111111111111111111111111111111".to_string(),
                price_usd: 0.5,
                resource: Some("/premium".to_string()),
                description: "premium access".to_string(),
            })
            .unwrap();
        assert_eq!(requirements.accepts.len(), 1);
        assert_eq!(requirements.accepts[0].max_amount_required, "500000");
        assert_eq!(requirements.accepts[0].network, "solana-devnet");
    }

    #[test]
    fn zero_or_negative_price_is_rejected() {
        let r#gen = generator();
        let request = PriceRequest {
            recipient_wallet: "11111111111111111111111111111111".to_string(),
            price_usd: 0.0,
            resource: None,
            description: "x".to_string(),
        };
        assert!(r#gen.generate(&request).is_err());
    }

    #[test]
    fn generate_multiple_preserves_order() {
        let r#gen = generator();
        let requests = vec![
            PriceRequest {
                recipient_wallet: "11111111111111111111111111111111".to_string(),
                price_usd: 1.0,
                resource: None,
                description: "a".to_string(),
            },
            PriceRequest {
                recipient_wallet: "11111111111111111111111111111111".to_string(),
                price_usd: 2.0,
                resource: None,
                description: "b".to_string(),
            },
        ];
        let results = r#gen.generate_multiple(&requests).unwrap();
        assert_eq!(results[0].accepts[0].max_amount_required, "1000000");
        assert_eq!(results[1].accepts[0].max_amount_required, "2000000");
    }
}
