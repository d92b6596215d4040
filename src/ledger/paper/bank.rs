//! Instruction execution for the paper ledger
//!
//! Runs against a scratch copy of the account map; the caller commits the
//! copy only when every instruction succeeds.

use crate::address::{
    derive_market_address, derive_owner_asset_account, derive_sub_address, Address,
    SubAddressTag, ASSOCIATED_TOKEN_PROGRAM_ID, NATIVE_MINT, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::error::ProgramErrorCode;
use crate::ledger::{decompile, fee_payer, AccountData, AccountMeta, Instruction, Transaction};
use crate::pool::Side;
use crate::program::token::{decode_system_transfer, TokenInstruction};
use crate::program::{
    MarketAccount, MarketInstruction, Mint, StatusTag, TokenAccount, MARKET_ACCOUNT_SPACE,
    MAX_DESCRIPTION_LEN, MAX_TITLE_LEN, MINT_LEN, TOKEN_ACCOUNT_LEN,
};
use std::collections::HashMap;
use std::fmt;

/// Flat fee per required signature
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const EXEMPTION_YEARS: u64 = 2;

// Framework codes
const INSTRUCTION_FALLBACK_NOT_FOUND: u32 = 101;
const CONSTRAINT_RAW: u32 = 2003;
const CONSTRAINT_SEEDS: u32 = 2006;
const ACCOUNT_DID_NOT_DESERIALIZE: u32 = 3003;
const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

// Token and system program codes
const ACCOUNT_ALREADY_IN_USE: u32 = 0;
const INSUFFICIENT_FUNDS: u32 = 1;
const MINT_MISMATCH: u32 = 3;
const OWNER_MISMATCH: u32 = 4;
const NON_NATIVE_HAS_BALANCE: u32 = 11;
const TOKEN_OVERFLOW: u32 = 14;
const ACCOUNT_FROZEN: u32 = 17;
const NON_NATIVE_NOT_SUPPORTED: u32 = 19;

/// Balance that keeps an account of `len` data bytes alive
pub fn rent_exempt_minimum(len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_YEARS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Fault {
    Custom(u32),
    Message(String),
}

impl Fault {
    fn message(text: &str) -> Self {
        Self::Message(text.to_string())
    }
}

impl From<ProgramErrorCode> for Fault {
    fn from(code: ProgramErrorCode) -> Self {
        Self::Custom(code.code())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(code) => write!(f, "custom program error: 0x{code:x}"),
            Self::Message(text) => f.write_str(text),
        }
    }
}

/// Why a transaction did not execute
#[derive(Debug, Clone)]
pub(super) struct Failure {
    /// Failing instruction, `None` for transaction-level failures
    pub index: Option<usize>,
    pub fault: Fault,
    pub logs: Vec<String>,
}

impl Failure {
    fn transaction(text: &str) -> Self {
        Self {
            index: None,
            fault: Fault::message(text),
            logs: vec![],
        }
    }

    /// Serialized error as simulation reports it
    pub fn err_json(&self) -> String {
        match (self.index, &self.fault) {
            (Some(i), Fault::Custom(code)) => {
                format!(r#"{{"InstructionError":[{i},{{"Custom":{code}}}]}}"#)
            }
            (Some(i), Fault::Message(text)) => format!(r#"{{"InstructionError":[{i},"{text}"]}}"#),
            (None, fault) => fault.to_string(),
        }
    }

    /// Message as a preflight-checked send reports it
    pub fn rpc_message(&self) -> String {
        match self.index {
            Some(i) => format!(
                "Transaction simulation failed: Error processing Instruction {i}: {}",
                self.fault
            ),
            None => format!("Transaction simulation failed: {}", self.fault),
        }
    }
}

/// Execute every instruction of `tx` against `accounts`
pub(super) fn execute(
    accounts: &mut HashMap<Address, AccountData>,
    program_id: &Address,
    tx: &Transaction,
    now: i64,
) -> Result<Vec<String>, Failure> {
    let message = &tx.message;
    let payer = fee_payer(message)
        .ok_or_else(|| Failure::transaction("Transaction has no fee payer"))?;
    let instructions = decompile(message)
        .ok_or_else(|| Failure::transaction("Transaction references an unknown account index"))?;
    let fee = LAMPORTS_PER_SIGNATURE * message.header.num_required_signatures as u64;

    let mut bank = Bank {
        accounts,
        program_id: *program_id,
        now,
        logs: Vec::new(),
    };
    bank.debit(&payer, fee).map_err(|_| {
        Failure::transaction("Attempt to debit an account but found no record of a prior credit.")
    })?;

    for (index, ix) in instructions.iter().enumerate() {
        let program = Address::from(ix.program_id);
        bank.logs.push(format!("Program {program} invoke [1]"));
        if let Err(fault) = bank.dispatch(program, ix) {
            if program == bank.program_id {
                if let Fault::Custom(code) = &fault {
                    if let Some(known) = ProgramErrorCode::from_code(*code) {
                        bank.logs.push(format!(
                            "Program log: AnchorError occurred. Error Code: {}. Error Number: {}. Error Message: {}.",
                            known.name(),
                            code,
                            known.message()
                        ));
                    }
                }
            }
            bank.logs
                .push(format!("Program {program} failed: {fault}"));
            return Err(Failure {
                index: Some(index),
                fault,
                logs: bank.logs,
            });
        }
        bank.logs.push(format!("Program {program} success"));
    }
    Ok(bank.logs)
}

struct Bank<'a> {
    accounts: &'a mut HashMap<Address, AccountData>,
    program_id: Address,
    now: i64,
    logs: Vec<String>,
}

fn meta(ix: &Instruction, i: usize) -> Result<&AccountMeta, Fault> {
    ix.accounts
        .get(i)
        .ok_or_else(|| Fault::message("insufficient account keys for instruction"))
}

fn signer(ix: &Instruction, i: usize) -> Result<Address, Fault> {
    let m = meta(ix, i)?;
    if !m.is_signer {
        return Err(Fault::message("missing required signature for instruction"));
    }
    Ok(m.pubkey.into())
}

fn key(ix: &Instruction, i: usize) -> Result<Address, Fault> {
    meta(ix, i).map(|m| m.pubkey.into())
}

fn require(condition: bool, code: ProgramErrorCode) -> Result<(), Fault> {
    if condition {
        Ok(())
    } else {
        Err(code.into())
    }
}

impl Bank<'_> {
    fn dispatch(&mut self, program: Address, ix: &Instruction) -> Result<(), Fault> {
        if program == SYSTEM_PROGRAM_ID {
            self.system(ix)
        } else if program == TOKEN_PROGRAM_ID {
            self.token(ix)
        } else if program == ASSOCIATED_TOKEN_PROGRAM_ID {
            self.associated_token(ix)
        } else if program == self.program_id {
            self.market(ix)
        } else {
            Err(Fault::message(
                "Attempt to load a program that does not exist",
            ))
        }
    }

    // Lamport bookkeeping

    fn debit(&mut self, address: &Address, lamports: u64) -> Result<(), Fault> {
        let account = self
            .accounts
            .get_mut(address)
            .ok_or(Fault::Custom(INSUFFICIENT_FUNDS))?;
        account.lamports = account
            .lamports
            .checked_sub(lamports)
            .ok_or(Fault::Custom(INSUFFICIENT_FUNDS))?;
        Ok(())
    }

    fn credit(&mut self, address: &Address, lamports: u64) {
        let account = self.accounts.entry(*address).or_insert_with(|| AccountData {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: vec![],
            executable: false,
        });
        account.lamports = account.lamports.saturating_add(lamports);
    }

    fn create(
        &mut self,
        payer: &Address,
        address: Address,
        owner: Address,
        data: Vec<u8>,
    ) -> Result<u64, Fault> {
        if self.accounts.contains_key(&address) {
            return Err(Fault::Custom(ACCOUNT_ALREADY_IN_USE));
        }
        let rent = rent_exempt_minimum(data.len());
        self.debit(payer, rent)?;
        self.accounts.insert(
            address,
            AccountData {
                lamports: rent,
                owner,
                data,
                executable: false,
            },
        );
        Ok(rent)
    }

    // Typed account access

    fn token_account(&self, address: &Address) -> Result<TokenAccount, Fault> {
        let account = self
            .accounts
            .get(address)
            .filter(|a| a.owner == TOKEN_PROGRAM_ID)
            .ok_or_else(|| Fault::message("invalid account data for instruction"))?;
        TokenAccount::unpack(&account.data)
            .map_err(|_| Fault::message("invalid account data for instruction"))
    }

    fn store_token(&mut self, address: &Address, token: &TokenAccount) {
        if let Some(account) = self.accounts.get_mut(address) {
            account.data = token.pack();
        }
    }

    fn mint(&self, address: &Address) -> Result<Mint, Fault> {
        let account = self
            .accounts
            .get(address)
            .filter(|a| a.owner == TOKEN_PROGRAM_ID)
            .ok_or_else(|| Fault::message("invalid account data for instruction"))?;
        Mint::unpack(&account.data).map_err(|_| Fault::message("invalid account data for instruction"))
    }

    fn store_mint(&mut self, address: &Address, mint: &Mint) {
        if let Some(account) = self.accounts.get_mut(address) {
            account.data = mint.pack();
        }
    }

    fn market_account(&self, address: &Address) -> Result<MarketAccount, Fault> {
        let account = self
            .accounts
            .get(address)
            .filter(|a| a.owner == self.program_id)
            .ok_or(Fault::Custom(ACCOUNT_NOT_INITIALIZED))?;
        MarketAccount::decode(&account.data).map_err(|_| Fault::Custom(ACCOUNT_DID_NOT_DESERIALIZE))
    }

    fn store_market(&mut self, address: &Address, market: &MarketAccount) -> Result<(), Fault> {
        let data = market
            .encode()
            .map_err(|_| Fault::Custom(ACCOUNT_DID_NOT_DESERIALIZE))?;
        if let Some(account) = self.accounts.get_mut(address) {
            account.data = data;
        }
        Ok(())
    }

    /// Token account checked against an expected mint and owner
    fn constrained_token(
        &self,
        address: &Address,
        mint: &Address,
        owner: &Address,
    ) -> Result<TokenAccount, Fault> {
        let token = self
            .token_account(address)
            .map_err(|_| Fault::Custom(ACCOUNT_NOT_INITIALIZED))?;
        if token.mint != *mint || token.owner != *owner {
            return Err(Fault::Custom(CONSTRAINT_RAW));
        }
        Ok(token)
    }

    // Token movements

    fn transfer_tokens(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
        authority: &Address,
    ) -> Result<(), Fault> {
        let mut src = self.token_account(from)?;
        let mut dst = self.token_account(to)?;
        if src.frozen || dst.frozen {
            return Err(Fault::Custom(ACCOUNT_FROZEN));
        }
        if src.owner != *authority {
            return Err(Fault::Custom(OWNER_MISMATCH));
        }
        if src.mint != dst.mint {
            return Err(Fault::Custom(MINT_MISMATCH));
        }
        src.amount = src
            .amount
            .checked_sub(amount)
            .ok_or(Fault::Custom(INSUFFICIENT_FUNDS))?;
        dst.amount = dst
            .amount
            .checked_add(amount)
            .ok_or(Fault::Custom(TOKEN_OVERFLOW))?;
        if src.is_native.is_some() {
            self.debit(from, amount)?;
            self.credit(to, amount);
        }
        self.store_token(from, &src);
        self.store_token(to, &dst);
        Ok(())
    }

    fn mint_to(&mut self, mint: &Address, to: &Address, amount: u64) -> Result<(), Fault> {
        let mut m = self.mint(mint)?;
        let mut dst = self.token_account(to)?;
        if dst.frozen {
            return Err(Fault::Custom(ACCOUNT_FROZEN));
        }
        if dst.mint != *mint {
            return Err(Fault::Custom(MINT_MISMATCH));
        }
        m.supply = m
            .supply
            .checked_add(amount)
            .ok_or(Fault::Custom(TOKEN_OVERFLOW))?;
        dst.amount = dst
            .amount
            .checked_add(amount)
            .ok_or(Fault::Custom(TOKEN_OVERFLOW))?;
        self.store_mint(mint, &m);
        self.store_token(to, &dst);
        Ok(())
    }

    fn burn(
        &mut self,
        mint: &Address,
        from: &Address,
        amount: u64,
        authority: &Address,
    ) -> Result<(), Fault> {
        let mut m = self.mint(mint)?;
        let mut src = self.token_account(from)?;
        if src.frozen {
            return Err(Fault::Custom(ACCOUNT_FROZEN));
        }
        if src.owner != *authority {
            return Err(Fault::Custom(OWNER_MISMATCH));
        }
        src.amount = src
            .amount
            .checked_sub(amount)
            .ok_or(Fault::Custom(INSUFFICIENT_FUNDS))?;
        m.supply = m.supply.saturating_sub(amount);
        self.store_mint(mint, &m);
        self.store_token(from, &src);
        Ok(())
    }

    // Programs

    fn system(&mut self, ix: &Instruction) -> Result<(), Fault> {
        let lamports = decode_system_transfer(&ix.data)
            .ok_or_else(|| Fault::message("invalid instruction data"))?;
        let from = signer(ix, 0)?;
        let to = key(ix, 1)?;
        self.debit(&from, lamports)?;
        self.credit(&to, lamports);
        Ok(())
    }

    fn token(&mut self, ix: &Instruction) -> Result<(), Fault> {
        let op = TokenInstruction::decode(&ix.data)
            .map_err(|_| Fault::message("invalid instruction data"))?;
        let address = key(ix, 0)?;
        let mut account = self.token_account(&address)?;
        match op {
            TokenInstruction::SyncNative => {
                let reserve = account
                    .is_native
                    .ok_or(Fault::Custom(NON_NATIVE_NOT_SUPPORTED))?;
                let lamports = self.accounts.get(&address).map_or(0, |a| a.lamports);
                account.amount = lamports.saturating_sub(reserve);
                self.store_token(&address, &account);
            }
            TokenInstruction::CloseAccount => {
                let destination = key(ix, 1)?;
                let owner = signer(ix, 2)?;
                if account.owner != owner {
                    return Err(Fault::Custom(OWNER_MISMATCH));
                }
                if account.is_native.is_none() && account.amount != 0 {
                    return Err(Fault::Custom(NON_NATIVE_HAS_BALANCE));
                }
                let lamports = self.accounts.remove(&address).map_or(0, |a| a.lamports);
                self.credit(&destination, lamports);
            }
        }
        Ok(())
    }

    fn associated_token(&mut self, ix: &Instruction) -> Result<(), Fault> {
        let payer = signer(ix, 0)?;
        let address = key(ix, 1)?;
        let owner = key(ix, 2)?;
        let mint = key(ix, 3)?;
        if address != derive_owner_asset_account(&owner, &mint) {
            return Err(Fault::message(
                "Provided seeds do not result in a valid address",
            ));
        }
        self.mint(&mint)?;

        let native = mint == NATIVE_MINT;
        let placeholder = TokenAccount {
            mint,
            owner,
            amount: 0,
            is_native: None,
            frozen: false,
        };
        let rent = self.create(&payer, address, TOKEN_PROGRAM_ID, placeholder.pack())?;
        if native {
            self.store_token(
                &address,
                &TokenAccount {
                    is_native: Some(rent),
                    ..placeholder
                },
            );
        }
        Ok(())
    }

    fn market(&mut self, ix: &Instruction) -> Result<(), Fault> {
        let op = MarketInstruction::decode(&ix.data)
            .map_err(|_| Fault::Custom(INSTRUCTION_FALLBACK_NOT_FOUND))?;
        match op {
            MarketInstruction::CreateMarket {
                title,
                description,
                expiry_timestamp,
            } => {
                self.logs.push("Program log: Instruction: CreateMarket".into());
                self.create_market(ix, title, description, expiry_timestamp)
            }
            MarketInstruction::PlaceBet { amount, side } => {
                self.logs.push("Program log: Instruction: PlaceBet".into());
                self.place_bet(ix, amount, side)
            }
            MarketInstruction::SettleMarket { outcome } => {
                self.logs.push("Program log: Instruction: SettleMarket".into());
                self.settle_market(ix, outcome)
            }
            MarketInstruction::Redeem { amount } => {
                self.logs.push("Program log: Instruction: Redeem".into());
                self.redeem(ix, amount)
            }
        }
    }

    fn create_market(
        &mut self,
        ix: &Instruction,
        title: String,
        description: String,
        expiry_timestamp: i64,
    ) -> Result<(), Fault> {
        let creator = signer(ix, 0)?;
        let market = key(ix, 1)?;
        let bet_mint = key(ix, 2)?;

        let (expected, bump) =
            derive_market_address(&creator, &bet_mint, expiry_timestamp, &self.program_id)
                .map_err(|_| Fault::Custom(CONSTRAINT_SEEDS))?;
        if market != expected {
            return Err(Fault::Custom(CONSTRAINT_SEEDS));
        }
        let asset = self
            .mint(&bet_mint)
            .map_err(|_| Fault::Custom(ACCOUNT_NOT_INITIALIZED))?;

        let mut subs = Vec::with_capacity(3);
        for (i, tag) in [
            (3, SubAddressTag::YesMint),
            (4, SubAddressTag::NoMint),
            (5, SubAddressTag::Vault),
        ] {
            let (derived, _) = derive_sub_address(tag, &market, &self.program_id)
                .map_err(|_| Fault::Custom(CONSTRAINT_SEEDS))?;
            if key(ix, i)? != derived {
                return Err(Fault::Custom(CONSTRAINT_SEEDS));
            }
            subs.push(derived);
        }
        let (yes_mint, no_mint, vault) = (subs[0], subs[1], subs[2]);

        require(expiry_timestamp > self.now, ProgramErrorCode::ExpiryInPast)?;
        require(title.len() <= MAX_TITLE_LEN, ProgramErrorCode::TitleTooLong)?;
        require(
            description.len() <= MAX_DESCRIPTION_LEN,
            ProgramErrorCode::DescriptionTooLong,
        )?;

        let record = MarketAccount {
            creator,
            title,
            description,
            bet_token_mint: bet_mint,
            vault,
            yes_mint,
            no_mint,
            yes_pool: 0,
            no_pool: 0,
            expiry_timestamp,
            status: StatusTag::Open,
            outcome: None,
            bump,
        };
        let data = record
            .encode()
            .map_err(|_| Fault::Custom(ACCOUNT_DID_NOT_DESERIALIZE))?;
        debug_assert_eq!(data.len(), MARKET_ACCOUNT_SPACE);
        self.create(&creator, market, self.program_id, data)?;

        let share_mint = Mint {
            mint_authority: Some(market),
            supply: 0,
            decimals: asset.decimals,
        };
        self.create(&creator, yes_mint, TOKEN_PROGRAM_ID, share_mint.pack())?;
        self.create(&creator, no_mint, TOKEN_PROGRAM_ID, share_mint.pack())?;

        let vault_token = TokenAccount {
            mint: bet_mint,
            owner: market,
            amount: 0,
            is_native: None,
            frozen: false,
        };
        let rent = self.create(&creator, vault, TOKEN_PROGRAM_ID, vault_token.pack())?;
        if bet_mint == NATIVE_MINT {
            self.store_token(
                &vault,
                &TokenAccount {
                    is_native: Some(rent),
                    ..vault_token
                },
            );
        }
        debug_assert_eq!(MINT_LEN, share_mint.pack().len());
        debug_assert_eq!(TOKEN_ACCOUNT_LEN, vault_token.pack().len());
        Ok(())
    }

    fn place_bet(&mut self, ix: &Instruction, amount: u64, side: Side) -> Result<(), Fault> {
        let bettor = signer(ix, 0)?;
        let market_key = key(ix, 1)?;
        let mut market = self.market_account(&market_key)?;
        require(market.status == StatusTag::Open, ProgramErrorCode::MarketNotOpen)?;
        require(
            key(ix, 2)? == market.bet_token_mint,
            ProgramErrorCode::InvalidBetToken,
        )?;
        require(key(ix, 3)? == market.yes_mint, ProgramErrorCode::InvalidMint)?;
        require(key(ix, 4)? == market.no_mint, ProgramErrorCode::InvalidMint)?;
        require(key(ix, 5)? == market.vault, ProgramErrorCode::InvalidVault)?;

        let bettor_token = key(ix, 6)?;
        let bettor_yes = key(ix, 7)?;
        let bettor_no = key(ix, 8)?;
        self.constrained_token(&bettor_token, &market.bet_token_mint, &bettor)?;
        self.constrained_token(&bettor_yes, &market.yes_mint, &bettor)?;
        self.constrained_token(&bettor_no, &market.no_mint, &bettor)?;

        require(
            self.now < market.expiry_timestamp,
            ProgramErrorCode::MarketExpired,
        )?;
        require(amount > 0, ProgramErrorCode::InvalidBetAmount)?;

        self.transfer_tokens(&bettor_token, &market.vault, amount, &bettor)?;
        let (mint, target, pool) = match side {
            Side::Yes => (market.yes_mint, bettor_yes, &mut market.yes_pool),
            Side::No => (market.no_mint, bettor_no, &mut market.no_pool),
        };
        *pool = pool
            .checked_add(amount)
            .ok_or(Fault::from(ProgramErrorCode::ArithmeticOverflow))?;
        self.mint_to(&mint, &target, amount)?;
        self.store_market(&market_key, &market)
    }

    fn settle_market(&mut self, ix: &Instruction, outcome: bool) -> Result<(), Fault> {
        let creator = signer(ix, 0)?;
        let market_key = key(ix, 1)?;
        let mut market = self.market_account(&market_key)?;
        require(market.creator == creator, ProgramErrorCode::Unauthorized)?;
        require(market.status == StatusTag::Open, ProgramErrorCode::AlreadySettled)?;
        require(
            self.now >= market.expiry_timestamp,
            ProgramErrorCode::MarketNotExpired,
        )?;
        market.status = StatusTag::Settled;
        market.outcome = Some(outcome);
        self.store_market(&market_key, &market)
    }

    fn redeem(&mut self, ix: &Instruction, amount: u64) -> Result<(), Fault> {
        let redeemer = signer(ix, 0)?;
        let market_key = key(ix, 1)?;
        let market = self.market_account(&market_key)?;
        require(market.status == StatusTag::Settled, ProgramErrorCode::NotSettled)?;
        require(key(ix, 2)? == market.vault, ProgramErrorCode::InvalidVault)?;

        let outcome = market
            .outcome
            .ok_or(Fault::from(ProgramErrorCode::NotSettled))?;
        let winning_mint = if outcome {
            market.yes_mint
        } else {
            market.no_mint
        };
        require(key(ix, 3)? == winning_mint, ProgramErrorCode::WrongMint)?;

        let winning_account = key(ix, 4)?;
        let bet_account = key(ix, 5)?;
        self.constrained_token(&winning_account, &winning_mint, &redeemer)?;
        self.constrained_token(&bet_account, &market.bet_token_mint, &redeemer)?;

        require(amount > 0, ProgramErrorCode::InvalidAmount)?;
        let vault_balance = self.token_account(&market.vault)?.amount;
        let winning_supply = self.mint(&winning_mint)?.supply;
        require(winning_supply > 0, ProgramErrorCode::NoWinningBets)?;
        require(vault_balance > 0, ProgramErrorCode::VaultEmpty)?;

        let share = amount as u128 * vault_balance as u128 / winning_supply as u128;
        let payout = share.min(vault_balance as u128) as u64;
        require(payout > 0, ProgramErrorCode::PayoutTooSmall)?;

        self.burn(&winning_mint, &winning_account, amount, &redeemer)?;
        self.transfer_tokens(&market.vault, &bet_account, payout, &market_key)
    }
}
