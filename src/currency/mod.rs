//! Currency conversion, address/signature validity, and network normalization (§4.A).

use crate::domain::Network;

/// Decimal places of the target stablecoin's smallest unit (micro-USD).
pub const ASSET_DECIMALS: u32 = 6;

/// Converts a USD amount into the asset's smallest-unit integer:
/// `floor(usd * 10^ASSET_DECIMALS)`.
///
/// Rejects negative or non-finite inputs.
pub fn usd_to_smallest_unit(usd: f64) -> Result<u64, String> {
    if !usd.is_finite() || usd < 0.0 {
        return Err(format!("invalid USD amount: {usd}"));
    }
    let scaled = usd * 10f64.powi(ASSET_DECIMALS as i32);
    Ok(scaled.floor() as u64)
}

/// The inverse of [`usd_to_smallest_unit`]: whole-unit and fractional-remainder
/// display, via plain integer division.
pub fn smallest_unit_to_usd_display(amount: u64) -> (u64, u64) {
    let scale = 10u64.pow(ASSET_DECIMALS);
    (amount / scale, amount % scale)
}

/// Decodes `s` as base58 and requires a 32-byte result (a valid address).
pub fn is_valid_address(s: &str) -> bool {
    matches!(bs58::decode(s).into_vec(), Ok(bytes) if bytes.len() == 32)
}

/// Base58-decodes `s` and requires a 64-byte result (a valid signature),
/// with a cheap character-class pre-check so obviously malformed input is
/// rejected before attempting to decode.
pub fn is_valid_signature(s: &str) -> bool {
    if s.len() < 64 || s.len() > 90 {
        return false;
    }
    if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return false;
    }
    matches!(bs58::decode(s).into_vec(), Ok(bytes) if bytes.len() == 64)
}

/// Normalizes common network aliases into the canonical [`Network`] set.
pub fn normalize_network(input: &str) -> Option<Network> {
    match input.to_lowercase().as_str() {
        "mainnet" | "mainnet-beta" | "solana" | "solana-mainnet" => Some(Network::Mainnet),
        "devnet" | "solana-devnet" => Some(Network::Devnet),
        "testnet" | "solana-testnet" => Some(Network::Testnet),
        "localnet" | "localhost" | "solana-localnet" => Some(Network::Localnet),
        _ => None,
    }
}

/// The wire form of a network: `solana-<net>`.
pub fn network_to_wire(network: Network) -> String {
    format!("solana-{}", network.as_str())
}

/// Strips the `solana-` chain-family prefix and normalizes the remainder.
pub fn network_from_wire(wire: &str) -> Option<Network> {
    normalize_network(wire.strip_prefix("solana-").unwrap_or(wire))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_conversion_round_trips_for_whole_micros() {
        for m in [0u64, 1, 1_000, 999_999, 5_000_000] {
            let usd = m as f64 / 10f64.powi(ASSET_DECIMALS as i32);
            assert_eq!(usd_to_smallest_unit(usd).unwrap(), m);
        }
    }

    #[test]
    fn negative_or_nan_usd_is_rejected() {
        assert!(usd_to_smallest_unit(-0.01).is_err());
        assert!(usd_to_smallest_unit(f64::NAN).is_err());
        assert!(usd_to_smallest_unit(f64::INFINITY).is_err());
    }

    #[test]
    fn address_validity_requires_32_decoded_bytes() {
        let address = bs58::encode([7u8; 32]).into_string();
        assert!(is_valid_address(&address));
        assert!(!is_valid_address("not-base58!!"));
        let too_short = bs58::encode([7u8; 16]).into_string();
        assert!(!is_valid_address(&too_short));
    }

    #[test]
    fn signature_validity_requires_64_decoded_bytes() {
        let signature = bs58::encode([9u8; 64]).into_string();
        assert!(is_valid_signature(&signature));
        assert!(!is_valid_signature("short"));
    }

    #[test]
    fn network_normalization_maps_known_aliases() {
        assert_eq!(normalize_network("mainnet-beta"), Some(Network::Mainnet));
        assert_eq!(normalize_network("Mainnet"), Some(Network::Mainnet));
        assert_eq!(normalize_network("localhost"), Some(Network::Localnet));
        assert_eq!(normalize_network("nonsense"), None);
    }

    #[test]
    fn network_wire_form_round_trips() {
        let wire = network_to_wire(Network::Devnet);
        assert_eq!(wire, "solana-devnet");
        assert_eq!(network_from_wire(&wire), Some(Network::Devnet));
    }
}
