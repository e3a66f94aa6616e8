//! Transaction parser (§4.B): extracts every SPL token transfer from a
//! fetched transaction, walking outer and inner instructions in order.

use crate::chain::rpc::{InstructionData, TokenBalance, TransactionResponse};
use crate::domain::types::{ParsedTransfer, UNKNOWN_MINT};

/// `spl_token::id()` as base58 — the legacy SPL Token program.
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
/// The Token-2022 program id. `Transfer`/`TransferChecked` share the same
/// discriminators and the fields this parser reads under both programs;
/// extension instructions (transfer-fee, confidential transfer) carry
/// different discriminators and are skipped like any other instruction.
const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

const DISCRIMINATOR_TRANSFER: u8 = 3;
const DISCRIMINATOR_TRANSFER_CHECKED: u8 = 12;

fn is_token_program(program_id: &str) -> bool {
    program_id == TOKEN_PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID
}

/// Parses every token transfer out of `tx`, in execution order: each outer
/// instruction, immediately followed by any inner instructions nested under
/// it (as reported in `meta.innerInstructions`).
pub fn parse_transfers(tx: &TransactionResponse) -> Vec<ParsedTransfer> {
    let account_keys = resolve_account_keys(tx);
    let pre_balances = tx.meta.pre_token_balances.as_deref().unwrap_or(&[]);
    let post_balances = tx.meta.post_token_balances.as_deref().unwrap_or(&[]);

    let mut transfers = Vec::new();
    let inner = tx.meta.inner_instructions.as_deref().unwrap_or(&[]);

    for (outer_index, instruction) in tx.transaction.message.instructions.iter().enumerate() {
        if let Some(t) = try_parse_instruction(instruction, &account_keys, pre_balances, post_balances) {
            transfers.push(t);
        }

        if let Some(set) = inner.iter().find(|set| set.index as usize == outer_index) {
            for instruction in &set.instructions {
                if let Some(t) = try_parse_instruction(instruction, &account_keys, pre_balances, post_balances) {
                    transfers.push(t);
                }
            }
        }
    }

    transfers
}

/// Static account keys followed by any addresses loaded from lookup tables —
/// the order versioned-transaction account indices are resolved against.
fn resolve_account_keys(tx: &TransactionResponse) -> Vec<String> {
    let mut keys = tx.transaction.message.account_keys.clone();
    if let Some(loaded) = &tx.meta.loaded_addresses {
        keys.extend(loaded.writable.iter().cloned());
        keys.extend(loaded.readonly.iter().cloned());
    }
    keys
}

fn try_parse_instruction(
    instruction: &InstructionData,
    account_keys: &[String],
    pre_balances: &[TokenBalance],
    post_balances: &[TokenBalance],
) -> Option<ParsedTransfer> {
    let program_id = account_keys.get(instruction.program_id_index as usize)?;
    if !is_token_program(program_id) {
        return None;
    }

    let data = bs58::decode(&instruction.data).into_vec().ok()?;
    if data.len() < 9 {
        return None;
    }

    let discriminator = data[0];
    let amount = u64::from_le_bytes(data[1..9].try_into().ok()?);

    let resolve = |idx: u8| account_keys.get(idx as usize).cloned();

    match discriminator {
        DISCRIMINATOR_TRANSFER => {
            let accounts = &instruction.accounts;
            if accounts.len() < 3 {
                return None;
            }
            let source = resolve(accounts[0])?;
            let destination = resolve(accounts[1])?;
            let authority = resolve(accounts[2])?;
            let dest_index = accounts[1];
            let mint = recover_mint(dest_index, post_balances)
                .or_else(|| recover_mint(dest_index, pre_balances))
                .unwrap_or_else(|| UNKNOWN_MINT.to_string());

            Some(ParsedTransfer { source, destination, authority, amount, mint })
        }
        DISCRIMINATOR_TRANSFER_CHECKED => {
            let accounts = &instruction.accounts;
            if accounts.len() < 4 {
                return None;
            }
            let source = resolve(accounts[0])?;
            let destination = resolve(accounts[1])?;
            let authority = resolve(accounts[2])?;
            let mint = resolve(accounts[3])?;

            Some(ParsedTransfer { source, destination, authority, amount, mint })
        }
        _ => None,
    }
}

fn recover_mint(account_index: u8, balances: &[TokenBalance]) -> Option<String> {
    balances
        .iter()
        .find(|b| b.account_index == account_index)
        .map(|b| b.mint.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::rpc::{
        InnerInstructionSet, TransactionData, TransactionMessage, TransactionMeta, UiTokenAmount,
    };

    fn transfer_instruction_data(amount: u64) -> String {
        let mut bytes = vec![DISCRIMINATOR_TRANSFER];
        bytes.extend_from_slice(&amount.to_le_bytes());
        bs58::encode(bytes).into_string()
    }

    fn transfer_checked_instruction_data(amount: u64) -> String {
        let mut bytes = vec![DISCRIMINATOR_TRANSFER_CHECKED];
        bytes.extend_from_slice(&amount.to_le_bytes());
        bytes.push(6); // decimals, unused by the parser
        bs58::encode(bytes).into_string()
    }

    fn base_tx(instructions: Vec<InstructionData>, account_keys: Vec<String>) -> TransactionResponse {
        TransactionResponse {
            slot: 1,
            transaction: TransactionData {
                message: TransactionMessage { account_keys, instructions },
                signatures: vec!["sig".to_string()],
            },
            meta: TransactionMeta {
                err: None,
                pre_token_balances: None,
                post_token_balances: None,
                inner_instructions: None,
                loaded_addresses: None,
            },
            block_time: Some(0),
        }
    }

    #[test]
    fn parses_two_account_transfer_and_recovers_mint_from_balances() {
        let keys = vec![
            "Source1111111111111111111111111111111111".to_string(),
            "Dest1111111111111111111111111111111111111".to_string(),
            "Authority111111111111111111111111111111111".to_string(),
            TOKEN_PROGRAM_ID.to_string(),
        ];
        let instruction = InstructionData {
            program_id_index: 3,
            accounts: vec![0, 1, 2],
            data: transfer_instruction_data(1_000),
        };
        let mut tx = base_tx(vec![instruction], keys);
        tx.meta.post_token_balances = Some(vec![TokenBalance {
            account_index: 1,
            mint: "Mint11111111111111111111111111111111111111".to_string(),
            owner: None,
            ui_token_amount: UiTokenAmount { amount: "1000".to_string(), decimals: 6, ui_amount: None },
        }]);

        let transfers = parse_transfers(&tx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 1_000);
        assert_eq!(transfers[0].destination, "Dest1111111111111111111111111111111111111");
        assert_eq!(transfers[0].mint, "Mint11111111111111111111111111111111111111");
    }

    #[test]
    fn transfer_without_balance_metadata_gets_unknown_mint() {
        let keys = vec![
            "Source1111111111111111111111111111111111".to_string(),
            "Dest1111111111111111111111111111111111111".to_string(),
            "Authority111111111111111111111111111111111".to_string(),
            TOKEN_PROGRAM_ID.to_string(),
        ];
        let instruction = InstructionData { program_id_index: 3, accounts: vec![0, 1, 2], data: transfer_instruction_data(500) };
        let tx = base_tx(vec![instruction], keys);

        let transfers = parse_transfers(&tx);
        assert_eq!(transfers[0].mint, UNKNOWN_MINT);
    }

    #[test]
    fn parses_transfer_checked_with_explicit_mint_account() {
        let keys = vec![
            "Source1111111111111111111111111111111111".to_string(),
            "Dest1111111111111111111111111111111111111".to_string(),
            "Authority111111111111111111111111111111111".to_string(),
            "Mint11111111111111111111111111111111111111".to_string(),
            TOKEN_PROGRAM_ID.to_string(),
        ];
        let instruction = InstructionData {
            program_id_index: 4,
            accounts: vec![0, 1, 2, 3],
            data: transfer_checked_instruction_data(2_000),
        };
        let tx = base_tx(vec![instruction], keys);

        let transfers = parse_transfers(&tx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].mint, "Mint11111111111111111111111111111111111111");
        assert_eq!(transfers[0].amount, 2_000);
    }

    #[test]
    fn instructions_shorter_than_nine_bytes_are_skipped() {
        let keys = vec!["A".to_string(), TOKEN_PROGRAM_ID.to_string()];
        let short_data = bs58::encode(vec![DISCRIMINATOR_TRANSFER, 1, 2]).into_string();
        let instruction = InstructionData { program_id_index: 1, accounts: vec![0], data: short_data };
        let tx = base_tx(vec![instruction], keys);

        assert!(parse_transfers(&tx).is_empty());
    }

    #[test]
    fn non_token_program_instructions_are_skipped_silently() {
        let keys = vec!["A".to_string(), "SomeOtherProgram11111111111111111111111111".to_string()];
        let instruction = InstructionData { program_id_index: 1, accounts: vec![0], data: transfer_instruction_data(1) };
        let tx = base_tx(vec![instruction], keys);

        assert!(parse_transfers(&tx).is_empty());
    }

    #[test]
    fn inner_instructions_nested_under_an_outer_instruction_are_parsed() {
        let keys = vec![
            "Outer1111111111111111111111111111111111111".to_string(),
            "Source1111111111111111111111111111111111".to_string(),
            "Dest1111111111111111111111111111111111111".to_string(),
            "Authority111111111111111111111111111111111".to_string(),
            TOKEN_PROGRAM_ID.to_string(),
        ];
        let outer = InstructionData { program_id_index: 0, accounts: vec![], data: bs58::encode(vec![9, 9]).into_string() };
        let inner_transfer = InstructionData { program_id_index: 4, accounts: vec![1, 2, 3], data: transfer_instruction_data(42) };
        let mut tx = base_tx(vec![outer], keys);
        tx.meta.inner_instructions = Some(vec![InnerInstructionSet { index: 0, instructions: vec![inner_transfer] }]);

        let transfers = parse_transfers(&tx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 42);
    }

    #[test]
    fn multiple_transfers_in_one_transaction_are_all_emitted() {
        let keys = vec![
            "Source1111111111111111111111111111111111".to_string(),
            "DestA111111111111111111111111111111111111".to_string(),
            "DestB111111111111111111111111111111111111".to_string(),
            "Authority111111111111111111111111111111111".to_string(),
            TOKEN_PROGRAM_ID.to_string(),
        ];
        let i1 = InstructionData { program_id_index: 4, accounts: vec![0, 1, 3], data: transfer_instruction_data(10) };
        let i2 = InstructionData { program_id_index: 4, accounts: vec![0, 2, 3], data: transfer_instruction_data(20) };
        let tx = base_tx(vec![i1, i2], keys);

        let transfers = parse_transfers(&tx);
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].amount, 10);
        assert_eq!(transfers[1].amount, 20);
    }
}
