//! Legacy transaction assembly on the ledger SDK's message types

use super::types::{Blockhash, Signature};
use crate::address::Address;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use thiserror::Error;

pub use solana_sdk::instruction::{AccountMeta, Instruction};
pub use solana_sdk::message::Message;
pub use solana_sdk::transaction::Transaction;

/// Most distinct accounts a legacy message can index
pub const MAX_ACCOUNT_KEYS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Message references {0} accounts, limit is 256")]
    TooManyAccounts(usize),
    #[error("Transaction has no instructions")]
    Empty,
}

/// Compile `instructions` into a message paid by `payer`
///
/// Key ordering and flag merging are the SDK's: payer first, then signers,
/// writable before readonly.
pub fn compile_message(
    payer: &Address,
    instructions: &[Instruction],
    blockhash: Blockhash,
) -> Result<Message, MessageError> {
    if instructions.is_empty() {
        return Err(MessageError::Empty);
    }
    let payer = Pubkey::from(*payer);

    let mut keys: HashSet<Pubkey> = HashSet::from([payer]);
    for ix in instructions {
        keys.insert(ix.program_id);
        keys.extend(ix.accounts.iter().map(|meta| meta.pubkey));
    }
    if keys.len() > MAX_ACCOUNT_KEYS {
        return Err(MessageError::TooManyAccounts(keys.len()));
    }

    Ok(Message::new_with_blockhash(
        instructions,
        Some(&payer),
        &Hash::from(blockhash),
    ))
}

/// Account paying the fee, the first key
pub fn fee_payer(message: &Message) -> Option<Address> {
    message.account_keys.first().copied().map(Address::from)
}

fn is_signer(message: &Message, index: usize) -> bool {
    index < message.header.num_required_signatures as usize
}

fn is_writable(message: &Message, index: usize) -> bool {
    let header = &message.header;
    let signed = header.num_required_signatures as usize;
    let keys = message.account_keys.len();
    if index < signed {
        index < signed.saturating_sub(header.num_readonly_signed_accounts as usize)
    } else {
        index < keys.saturating_sub(header.num_readonly_unsigned_accounts as usize)
    }
}

/// Instructions of a compiled message with their account flags restored
///
/// `None` when an instruction indexes past the key list.
pub fn decompile(message: &Message) -> Option<Vec<Instruction>> {
    message
        .instructions
        .iter()
        .map(|ix| {
            let program_id = *message.account_keys.get(ix.program_id_index as usize)?;
            let accounts = ix
                .accounts
                .iter()
                .map(|&i| {
                    let i = i as usize;
                    let pubkey = *message.account_keys.get(i)?;
                    Some(AccountMeta {
                        pubkey,
                        is_signer: is_signer(message, i),
                        is_writable: is_writable(message, i),
                    })
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Instruction {
                program_id,
                accounts,
                data: ix.data.clone(),
            })
        })
        .collect()
}

/// Fee payer's signature, the transaction's identifier
pub fn transaction_signature(transaction: &Transaction) -> Option<Signature> {
    transaction.signatures.first().copied().map(Signature::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::SYSTEM_PROGRAM_ID;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    fn transfer(from: Pubkey, to: Pubkey) -> Instruction {
        solana_sdk::system_instruction::transfer(&from, &to, 1_000)
    }

    #[test]
    fn test_transfer_message_layout() {
        let payer = Address::new([1; 32]);
        let to = key(2);
        let msg = compile_message(&payer, &[transfer(payer.into(), to)], Blockhash::default())
            .unwrap();

        assert_eq!(
            msg.account_keys,
            vec![Pubkey::from(payer), to, Pubkey::from(SYSTEM_PROGRAM_ID)]
        );
        assert_eq!(msg.header.num_required_signatures, 1);
        assert_eq!(msg.header.num_readonly_signed_accounts, 0);
        assert_eq!(msg.header.num_readonly_unsigned_accounts, 1);
        assert_eq!(msg.instructions[0].program_id_index, 2);
        assert_eq!(msg.instructions[0].accounts, vec![0, 1]);
        assert_eq!(msg.serialize().len(), 150);
        assert_eq!(fee_payer(&msg), Some(payer));

        let tx = Transaction::new_unsigned(msg);
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(transaction_signature(&tx), Some(Signature::default()));
    }

    #[test]
    fn test_flags_merge_and_ordering() {
        let payer = Address::new([9; 32]);
        let (ro, rw, program) = (key(4), key(5), key(6));
        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new_readonly(ro, false),
                AccountMeta::new_readonly(rw, false),
                AccountMeta::new(rw, false),
            ],
            data: vec![],
        };
        let msg = compile_message(&payer, &[ix], Blockhash::default()).unwrap();

        assert_eq!(msg.account_keys[0], Pubkey::from(payer));
        assert_eq!(msg.account_keys[1], rw);
        assert!(is_writable(&msg, 1));
        assert!(!is_writable(&msg, 2));
        assert!(!is_signer(&msg, 1));
        assert_eq!(msg.header.num_readonly_unsigned_accounts, 2);
    }

    #[test]
    fn test_decompile_restores_instructions() {
        let payer = Address::new([1; 32]);
        let ix = transfer(payer.into(), key(2));
        let msg =
            compile_message(&payer, std::slice::from_ref(&ix), Blockhash::default()).unwrap();
        assert_eq!(decompile(&msg), Some(vec![ix]));
    }

    #[test]
    fn test_decompile_rejects_out_of_range_index() {
        let payer = Address::new([1; 32]);
        let mut msg =
            compile_message(&payer, &[transfer(payer.into(), key(2))], Blockhash::default())
                .unwrap();
        msg.instructions[0].accounts.push(9);
        assert_eq!(decompile(&msg), None);
    }

    #[test]
    fn test_empty_and_oversized_messages_rejected() {
        assert_eq!(
            compile_message(&Address::default(), &[], Blockhash::default()),
            Err(MessageError::Empty)
        );

        let accounts = (0..=255u8)
            .map(|b| AccountMeta::new_readonly(Pubkey::new_from_array([b; 32]), false))
            .collect();
        let wide = Instruction {
            program_id: Pubkey::new_unique(),
            accounts,
            data: vec![],
        };
        assert!(matches!(
            compile_message(&Address::new([1; 32]), &[wide], Blockhash::default()),
            Err(MessageError::TooManyAccounts(_))
        ));
    }
}
