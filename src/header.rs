//! Base64+JSON codec for the `X-PAYMENT` and `X-PAYMENT-RESPONSE` headers
//! (§4.H), plus the structural validation §3 requires before a proof is
//! handed to the verification orchestrator.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

use crate::domain::types::{PaymentProof, PaymentReceipt, ProofPayload};

const SUPPORTED_X402_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("header value is not valid base64")]
    NotBase64,
    #[error("header value is not valid JSON: {0}")]
    NotJson(String),
    #[error("unsupported x402Version {0}")]
    UnsupportedVersion(u32),
    #[error("scheme must not be empty")]
    EmptyScheme,
    #[error("network must not be empty")]
    EmptyNetwork,
    #[error("serialized transaction is not valid base64")]
    TransactionNotBase64,
    #[error("serialized transaction could not be deserialized as a versioned or legacy transaction")]
    UndecodableTransaction,
    #[error("serialized transaction carries no signatures")]
    TransactionMissingSignatures,
}

/// Decodes and structurally validates an `X-PAYMENT` header value.
pub fn decode_proof(header_value: &str) -> Result<PaymentProof, HeaderError> {
    let bytes = BASE64.decode(header_value.trim()).map_err(|_| HeaderError::NotBase64)?;
    let proof: PaymentProof =
        serde_json::from_slice(&bytes).map_err(|e| HeaderError::NotJson(e.to_string()))?;
    validate_proof(&proof)?;
    Ok(proof)
}

fn validate_proof(proof: &PaymentProof) -> Result<(), HeaderError> {
    if proof.x402_version != SUPPORTED_X402_VERSION {
        return Err(HeaderError::UnsupportedVersion(proof.x402_version));
    }
    if proof.scheme.is_empty() {
        return Err(HeaderError::EmptyScheme);
    }
    if proof.network.is_empty() {
        return Err(HeaderError::EmptyNetwork);
    }
    Ok(())
}

/// Resolves a decoded proof to the on-chain signature the orchestrator
/// should verify: the signature directly, or — for a serialized-transaction
/// payload — the first signature of the deserialized transaction (versioned
/// first, legacy fallback), as base58.
pub fn resolve_signature(proof: &PaymentProof) -> Result<String, HeaderError> {
    match &proof.payload {
        ProofPayload::Signature { signature } => Ok(signature.clone()),
        ProofPayload::SerializedTransaction { serialized_transaction } => {
            first_signature_of_serialized_transaction(serialized_transaction)
        }
    }
}

fn first_signature_of_serialized_transaction(serialized: &str) -> Result<String, HeaderError> {
    let bytes = BASE64.decode(serialized.trim()).map_err(|_| HeaderError::TransactionNotBase64)?;

    let signatures = match bincode::deserialize::<VersionedTransaction>(&bytes) {
        Ok(tx) => tx.signatures,
        Err(_) => {
            let legacy: Transaction =
                bincode::deserialize(&bytes).map_err(|_| HeaderError::UndecodableTransaction)?;
            legacy.signatures
        }
    };

    signatures
        .first()
        .map(|signature| signature.to_string())
        .ok_or(HeaderError::TransactionMissingSignatures)
}

/// Base64+JSON-encodes a proof for outbound client use.
pub fn encode_proof(proof: &PaymentProof) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(proof).map_err(|e| HeaderError::NotJson(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Convenience constructor for a signature-only proof.
pub fn signature_proof(network: impl Into<String>, signature: impl Into<String>) -> PaymentProof {
    PaymentProof {
        x402_version: SUPPORTED_X402_VERSION,
        scheme: "exact".to_string(),
        network: network.into(),
        payload: ProofPayload::Signature { signature: signature.into() },
    }
}

/// Convenience constructor for a serialized-transaction proof.
pub fn serialized_transaction_proof(
    network: impl Into<String>,
    serialized_transaction: impl Into<String>,
) -> PaymentProof {
    PaymentProof {
        x402_version: SUPPORTED_X402_VERSION,
        scheme: "exact".to_string(),
        network: network.into(),
        payload: ProofPayload::SerializedTransaction {
            serialized_transaction: serialized_transaction.into(),
        },
    }
}

/// Encodes a receipt for the `X-PAYMENT-RESPONSE` header.
pub fn encode_receipt(receipt: &PaymentReceipt) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(receipt).map_err(|e| HeaderError::NotJson(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
pub fn decode_receipt(header_value: &str) -> Result<PaymentReceipt, HeaderError> {
    let bytes = BASE64.decode(header_value.trim()).map_err(|_| HeaderError::NotBase64)?;
    serde_json::from_slice(&bytes).map_err(|e| HeaderError::NotJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_signature_proof() {
        let proof = signature_proof("solana-devnet", "abc123");
        let encoded = encode_proof(&proof).unwrap();
        let decoded = decode_proof(&encoded).unwrap();
        assert_eq!(decoded.network, "solana-devnet");
        assert!(matches!(decoded.payload, ProofPayload::Signature { .. }));
    }

    #[test]
    fn rejects_non_base64_header() {
        assert_eq!(decode_proof("not base64!!!"), Err(HeaderError::NotBase64));
    }

    #[test]
    fn rejects_unsupported_version() {
        let json = serde_json::json!({
            "x402Version": 99,
            "scheme": "exact",
            "network": "solana-devnet",
            "signature": "abc"
        });
        let encoded = BASE64.encode(serde_json::to_vec(&json).unwrap());
        assert_eq!(decode_proof(&encoded), Err(HeaderError::UnsupportedVersion(99)));
    }

    #[test]
    fn rejects_empty_scheme() {
        let json = serde_json::json!({
            "x402Version": 1,
            "scheme": "",
            "network": "solana-devnet",
            "signature": "abc"
        });
        let encoded = BASE64.encode(serde_json::to_vec(&json).unwrap());
        assert_eq!(decode_proof(&encoded), Err(HeaderError::EmptyScheme));
    }

    #[test]
    fn resolves_the_signature_directly_for_a_signature_proof() {
        let proof = signature_proof("solana-devnet", "sig123");
        assert_eq!(resolve_signature(&proof).unwrap(), "sig123");
    }

    #[test]
    fn resolves_the_first_signature_of_a_legacy_serialized_transaction() {
        use solana_sdk::message::Message;
        use solana_sdk::pubkey::Pubkey;

        let payer = Pubkey::new_unique();
        let message = Message::new(&[], Some(&payer));
        let transaction = Transaction::new_unsigned(message);
        let expected = transaction.signatures[0].to_string();

        let bytes = bincode::serialize(&transaction).unwrap();
        let proof = serialized_transaction_proof("solana-devnet", BASE64.encode(bytes));

        assert_eq!(resolve_signature(&proof).unwrap(), expected);
    }

    #[test]
    fn resolves_the_first_signature_of_a_versioned_serialized_transaction() {
        use solana_sdk::message::{Message, VersionedMessage};
        use solana_sdk::pubkey::Pubkey;
        use solana_sdk::signature::Signature;

        let payer = Pubkey::new_unique();
        let legacy_message = Message::new(&[], Some(&payer));
        let transaction = VersionedTransaction {
            signatures: vec![Signature::new_unique()],
            message: VersionedMessage::Legacy(legacy_message),
        };
        let expected = transaction.signatures[0].to_string();

        let bytes = bincode::serialize(&transaction).unwrap();
        let proof = serialized_transaction_proof("solana-devnet", BASE64.encode(bytes));

        assert_eq!(resolve_signature(&proof).unwrap(), expected);
    }

    #[test]
    fn rejects_garbage_serialized_transaction_bytes() {
        let proof = serialized_transaction_proof("solana-devnet", BASE64.encode(b"not a transaction"));
        assert_eq!(resolve_signature(&proof), Err(HeaderError::UndecodableTransaction));
    }
}
