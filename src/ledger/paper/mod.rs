//! Paper ledger with simulated execution
//!
//! Holds every account in memory and executes the system, token,
//! associated-token and market program instructions the engine emits, with
//! the same rejection codes the live programs return. Used for dry runs and
//! as the test double behind the integration suite.

mod bank;

pub use bank::{rent_exempt_minimum, LAMPORTS_PER_SIGNATURE};

use super::types::{
    AccountData, Blockhash, LedgerError, Signature, SignatureStatus, SimulationOutcome,
};
use super::{transaction_signature, Clock, LedgerClient, SignerHandle, Transaction};
use crate::address::{derive_owner_asset_account, Address, NATIVE_MINT, TOKEN_PROGRAM_ID};
use crate::program::{MarketAccount, Mint, TokenAccount};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Scripted outcome for the next submission
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// Executes and commits, but the confirmation verdict is lost
    LandedUnconfirmed,
    /// Never executes and the verdict is lost
    DroppedUnconfirmed,
    /// Fails with this error without executing
    Error(LedgerError),
}

#[derive(Default)]
struct PaperState {
    accounts: HashMap<Address, AccountData>,
    statuses: HashMap<Signature, SignatureStatus>,
    blockhashes: HashSet<Blockhash>,
    blockhash_seq: u64,
    submit_script: VecDeque<ScriptedFailure>,
    read_script: VecDeque<LedgerError>,
    simulations: usize,
    submissions: usize,
}

impl PaperState {
    fn scripted_read(&mut self) -> Result<(), LedgerError> {
        match self.read_script.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory ledger
#[derive(Clone)]
pub struct PaperLedger {
    program_id: Address,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<PaperState>>,
}

impl PaperLedger {
    /// Empty ledger with the native asset mint in place
    pub fn new(program_id: Address, clock: Arc<dyn Clock>) -> Self {
        let mut state = PaperState::default();
        state.accounts.insert(NATIVE_MINT, mint_account(None, 9));
        Self {
            program_id,
            clock,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    pub async fn put_account(&self, address: Address, account: AccountData) {
        self.state.write().await.accounts.insert(address, account);
    }

    pub async fn remove_account(&self, address: &Address) -> Option<AccountData> {
        self.state.write().await.accounts.remove(address)
    }

    /// Add native balance, creating a plain account if needed
    pub async fn airdrop(&self, address: &Address, lamports: u64) {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .entry(*address)
            .or_insert_with(|| system_account(0));
        account.lamports = account.lamports.saturating_add(lamports);
    }

    /// Create an asset mint
    pub async fn create_mint(&self, mint: Address, decimals: u8) {
        self.put_account(mint, mint_account(None, decimals)).await;
    }

    /// Credit `amount` of `mint` to the owner's standard sub-account,
    /// creating the account if needed
    pub async fn mint_to_owner(&self, owner: &Address, mint: &Address, amount: u64) -> Address {
        let address = derive_owner_asset_account(owner, mint);
        let mut state = self.state.write().await;

        let mut token = state
            .accounts
            .get(&address)
            .and_then(|a| TokenAccount::unpack(&a.data).ok())
            .unwrap_or(TokenAccount {
                mint: *mint,
                owner: *owner,
                amount: 0,
                is_native: None,
                frozen: false,
            });
        token.amount = token.amount.saturating_add(amount);

        if let Some(mint_acc) = state.accounts.get_mut(mint) {
            if let Ok(mut m) = Mint::unpack(&mint_acc.data) {
                m.supply = m.supply.saturating_add(amount);
                mint_acc.data = m.pack();
            }
        }
        let rent = rent_exempt_minimum(token.pack().len());
        state.accounts.insert(
            address,
            AccountData {
                lamports: rent,
                owner: TOKEN_PROGRAM_ID,
                data: token.pack(),
                executable: false,
            },
        );
        address
    }

    pub async fn account(&self, address: &Address) -> Option<AccountData> {
        self.state.read().await.accounts.get(address).cloned()
    }

    pub async fn lamports(&self, address: &Address) -> u64 {
        self.account(address).await.map_or(0, |a| a.lamports)
    }

    /// Token amount held in a sub-account
    pub async fn token_amount(&self, address: &Address) -> Option<u64> {
        let account = self.account(address).await?;
        TokenAccount::unpack(&account.data).ok().map(|t| t.amount)
    }

    pub async fn mint_supply(&self, mint: &Address) -> Option<u64> {
        let account = self.account(mint).await?;
        Mint::unpack(&account.data).ok().map(|m| m.supply)
    }

    pub async fn market(&self, address: &Address) -> Option<MarketAccount> {
        let account = self.account(address).await?;
        MarketAccount::decode(&account.data).ok()
    }

    /// Queue an outcome for an upcoming submission
    pub async fn script_submission(&self, failure: ScriptedFailure) {
        self.state.write().await.submit_script.push_back(failure);
    }

    /// Queue a failure for an upcoming account read
    pub async fn script_read_error(&self, err: LedgerError) {
        self.state.write().await.read_script.push_back(err);
    }

    /// Scripted read failures not yet consumed
    pub async fn pending_read_errors(&self) -> usize {
        self.state.read().await.read_script.len()
    }

    pub async fn simulation_count(&self) -> usize {
        self.state.read().await.simulations
    }

    pub async fn submission_count(&self) -> usize {
        self.state.read().await.submissions
    }
}

fn system_account(lamports: u64) -> AccountData {
    AccountData {
        lamports,
        owner: crate::address::SYSTEM_PROGRAM_ID,
        data: vec![],
        executable: false,
    }
}

fn mint_account(authority: Option<Address>, decimals: u8) -> AccountData {
    let data = Mint {
        mint_authority: authority,
        supply: 0,
        decimals,
    }
    .pack();
    AccountData {
        lamports: rent_exempt_minimum(data.len()),
        owner: TOKEN_PROGRAM_ID,
        data,
        executable: false,
    }
}

#[async_trait]
impl LedgerClient for PaperLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountData>, LedgerError> {
        let mut state = self.state.write().await;
        state.scripted_read()?;
        Ok(state.accounts.get(address).cloned())
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<AccountData>>, LedgerError> {
        let mut state = self.state.write().await;
        state.scripted_read()?;
        Ok(addresses
            .iter()
            .map(|a| state.accounts.get(a).cloned())
            .collect())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &[u8],
    ) -> Result<Vec<(Address, AccountData)>, LedgerError> {
        let mut state = self.state.write().await;
        state.scripted_read()?;
        let mut found: Vec<_> = state
            .accounts
            .iter()
            .filter(|(_, a)| a.owner == *program_id && a.data.starts_with(discriminator))
            .map(|(k, a)| (*k, a.clone()))
            .collect();
        found.sort_by_key(|(k, _)| *k);
        Ok(found)
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        Ok(self.lamports(address).await)
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        Ok(rent_exempt_minimum(data_len))
    }

    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError> {
        let mut state = self.state.write().await;
        state.blockhash_seq += 1;
        let digest = Sha256::digest(state.blockhash_seq.to_le_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let hash = Blockhash::new(bytes);
        state.blockhashes.insert(hash);
        Ok(hash)
    }

    async fn simulate(&self, transaction: &Transaction) -> Result<SimulationOutcome, LedgerError> {
        let mut state = self.state.write().await;
        state.simulations += 1;
        let mut scratch = state.accounts.clone();
        drop(state);

        let now = self.clock.unix_timestamp();
        let outcome = match bank::execute(&mut scratch, &self.program_id, transaction, now) {
            Ok(logs) => SimulationOutcome {
                err: None,
                logs,
                units_consumed: Some(0),
            },
            Err(failure) => SimulationOutcome {
                err: Some(failure.err_json()),
                logs: failure.logs,
                units_consumed: Some(0),
            },
        };
        tracing::debug!(ok = outcome.is_ok(), "Paper simulation");
        Ok(outcome)
    }

    async fn submit_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        let signature = transaction_signature(transaction).unwrap_or_default();
        let mut state = self.state.write().await;
        state.submissions += 1;

        if !state
            .blockhashes
            .contains(&Blockhash::from(transaction.message.recent_blockhash))
        {
            return Err(LedgerError::Rpc {
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".into(),
                logs: vec![],
            });
        }
        if state.statuses.contains_key(&signature) {
            return Err(LedgerError::Unconfirmed {
                signature: Some(signature),
            });
        }

        let landed_unconfirmed = match state.submit_script.pop_front() {
            Some(ScriptedFailure::Error(err)) => return Err(err),
            Some(ScriptedFailure::DroppedUnconfirmed) => {
                return Err(LedgerError::Unconfirmed {
                    signature: Some(signature),
                })
            }
            Some(ScriptedFailure::LandedUnconfirmed) => true,
            None => false,
        };

        let now = self.clock.unix_timestamp();
        let mut scratch = state.accounts.clone();
        if let Err(failure) = bank::execute(&mut scratch, &self.program_id, transaction, now) {
            return Err(LedgerError::Rpc {
                code: -32002,
                message: failure.rpc_message(),
                logs: failure.logs,
            });
        }
        state.accounts = scratch;
        state.statuses.insert(
            signature,
            SignatureStatus {
                confirmed: true,
                err: None,
            },
        );
        tracing::info!(%signature, "Paper transaction confirmed");

        if landed_unconfirmed {
            return Err(LedgerError::Unconfirmed {
                signature: Some(signature),
            });
        }
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        Ok(self.state.read().await.statuses.get(signature).cloned())
    }
}

/// Signer producing placeholder signatures
///
/// The signature is a digest of identity and message, unique per payload
/// but not a valid ed25519 signature.
pub struct PaperSigner {
    identity: Address,
    declining: AtomicBool,
    requests: AtomicUsize,
}

impl PaperSigner {
    pub fn new(identity: Address) -> Self {
        Self {
            identity,
            declining: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    /// Refuse every following request, like a user dismissing the prompt
    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    /// Signature prompts shown so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignerHandle for PaperSigner {
    fn identity(&self) -> Address {
        self.identity
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, LedgerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.declining.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("User rejected the request.".into()));
        }
        let first = Sha256::new()
            .chain_update(self.identity.as_bytes())
            .chain_update(message)
            .finalize();
        let second = Sha256::digest(first);
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&first);
        bytes[32..].copy_from_slice(&second);
        Ok(Signature::new(bytes))
    }
}
