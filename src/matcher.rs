//! Transfer matcher (§4.C): selects the parsed transfer that satisfies an
//! expected recipient/amount/mint, or explains why none does.

use crate::domain::error::VerificationErrorCode;
use crate::domain::types::{ParsedTransfer, UNKNOWN_MINT};

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub strict_mint_check: bool,
    pub allow_overpayment: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { strict_mint_check: true, allow_overpayment: false }
    }
}

pub struct MatchRequest<'a> {
    pub transfers: &'a [ParsedTransfer],
    pub expected_recipient: &'a str,
    pub expected_mint: &'a str,
    pub required_smallest_unit: u64,
    pub options: MatchOptions,
}

pub enum MatchOutcome {
    Matched(ParsedTransfer),
    Rejected { code: VerificationErrorCode, observed: Vec<(String, u64)> },
}

/// Picks the first candidate transfer that satisfies `request`, in list order.
pub fn match_transfer(request: &MatchRequest<'_>) -> MatchOutcome {
    if request.transfers.is_empty() {
        return MatchOutcome::Rejected {
            code: VerificationErrorCode::NoUsdcTransfer,
            observed: Vec::new(),
        };
    }

    let to_recipient: Vec<&ParsedTransfer> = request
        .transfers
        .iter()
        .filter(|t| t.destination == request.expected_recipient)
        .collect();

    if to_recipient.is_empty() {
        return MatchOutcome::Rejected {
            code: VerificationErrorCode::TransferMismatch,
            observed: request.transfers.iter().map(|t| (t.destination.clone(), t.amount)).collect(),
        };
    }

    for transfer in &to_recipient {
        if request.options.strict_mint_check
            && transfer.mint != UNKNOWN_MINT
            && transfer.mint != request.expected_mint
        {
            continue;
        }

        let accepted = if request.options.allow_overpayment {
            transfer.amount >= request.required_smallest_unit
        } else {
            transfer.amount == request.required_smallest_unit
        };

        if accepted {
            return MatchOutcome::Matched((*transfer).clone());
        }
    }

    MatchOutcome::Rejected {
        code: VerificationErrorCode::InsufficientAmount,
        observed: to_recipient.iter().map(|t| (t.destination.clone(), t.amount)).collect(),
    }
}
