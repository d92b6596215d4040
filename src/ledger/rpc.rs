//! JSON-RPC ledger client

use super::types::{
    AccountData, Blockhash, LedgerError, Signature, SignatureStatus, SimulationOutcome,
};
use super::{transaction_signature, LedgerClient, Transaction};
use crate::address::Address;
use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
    RpcSimulateTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

/// Most addresses per `getMultipleAccounts` call
const MULTIPLE_ACCOUNTS_LIMIT: usize = 100;

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Commitment level for reads and confirmation
    pub commitment: String,
    /// Status polls after sending before giving up
    pub confirmation_attempts: u32,
    pub poll_interval: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            commitment: "confirmed".to_string(),
            confirmation_attempts: 30,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Ledger client speaking JSON-RPC over HTTP
pub struct RpcLedger {
    config: RpcConfig,
    commitment: CommitmentConfig,
    client: RpcClient,
}

/// Fold a client failure into the ledger taxonomy
fn ledger_error(err: ClientError) -> LedgerError {
    match err.kind() {
        ClientErrorKind::Reqwest(e) if e.is_timeout() => LedgerError::Timeout,
        ClientErrorKind::Reqwest(e) => match e.status() {
            Some(status) => LedgerError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => LedgerError::Transport(e.to_string()),
        },
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            code,
            message,
            data,
        }) => LedgerError::Rpc {
            code: *code,
            message: message.clone(),
            logs: match data {
                RpcResponseErrorData::SendTransactionPreflightFailure(sim) => {
                    sim.logs.clone().unwrap_or_default()
                }
                _ => vec![],
            },
        },
        ClientErrorKind::RpcError(RpcError::ParseError(what)) => {
            LedgerError::Malformed(what.clone())
        }
        ClientErrorKind::SerdeJson(e) => LedgerError::Malformed(e.to_string()),
        ClientErrorKind::TransactionError(e) => LedgerError::Failed {
            message: e.to_string(),
            logs: vec![],
        },
        _ => LedgerError::Transport(err.to_string()),
    }
}

fn account_data(account: Account) -> AccountData {
    AccountData {
        lamports: account.lamports,
        owner: account.owner.into(),
        data: account.data,
        executable: account.executable,
    }
}

/// Serialized transaction error, as simulation and status calls report it
fn error_json<E: serde::Serialize + std::fmt::Display>(err: &E) -> String {
    serde_json::to_string(err).unwrap_or_else(|_| err.to_string())
}

impl RpcLedger {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        Self::with_config(RpcConfig::new(url))
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, LedgerError> {
        let commitment = CommitmentConfig::from_str(&config.commitment).map_err(|e| {
            LedgerError::Malformed(format!("commitment {}: {e}", config.commitment))
        })?;
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            config.timeout,
            commitment,
        );
        Ok(Self {
            config,
            commitment,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn account_config(&self) -> RpcAccountInfoConfig {
        RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(self.commitment),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountData>, LedgerError> {
        tracing::debug!(%address, "getAccountInfo");
        let response = self
            .client
            .get_account_with_commitment(&Pubkey::from(*address), self.commitment)
            .await
            .map_err(ledger_error)?;
        Ok(response.value.map(account_data))
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<Option<AccountData>>, LedgerError> {
        let mut out = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MULTIPLE_ACCOUNTS_LIMIT) {
            let keys: Vec<Pubkey> = chunk.iter().copied().map(Pubkey::from).collect();
            tracing::debug!(count = keys.len(), "getMultipleAccounts");
            let response = self
                .client
                .get_multiple_accounts_with_commitment(&keys, self.commitment)
                .await
                .map_err(ledger_error)?;
            out.extend(response.value.into_iter().map(|a| a.map(account_data)));
        }
        Ok(out)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &[u8],
    ) -> Result<Vec<(Address, AccountData)>, LedgerError> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                0,
                discriminator,
            ))]),
            account_config: self.account_config(),
            ..Default::default()
        };
        tracing::debug!(%program_id, "getProgramAccounts");
        let accounts = self
            .client
            .get_program_accounts_with_config(&Pubkey::from(*program_id), config)
            .await
            .map_err(ledger_error)?;
        Ok(accounts
            .into_iter()
            .map(|(key, account)| (key.into(), account_data(account)))
            .collect())
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let response = self
            .client
            .get_balance_with_commitment(&Pubkey::from(*address), self.commitment)
            .await
            .map_err(ledger_error)?;
        Ok(response.value)
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(ledger_error)
    }

    async fn latest_blockhash(&self) -> Result<Blockhash, LedgerError> {
        let (hash, _) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(ledger_error)?;
        Ok(hash.into())
    }

    async fn simulate(&self, transaction: &Transaction) -> Result<SimulationOutcome, LedgerError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..Default::default()
        };
        let response = self
            .client
            .simulate_transaction_with_config(transaction, config)
            .await
            .map_err(ledger_error)?;
        let value = response.value;
        Ok(SimulationOutcome {
            err: value.err.as_ref().map(error_json),
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
        })
    }

    async fn submit_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        let expected = transaction_signature(transaction);
        let config = RpcSendTransactionConfig {
            preflight_commitment: Some(self.commitment.commitment),
            ..Default::default()
        };
        let sent = self
            .client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(ledger_error);

        let signature: Signature = match sent {
            Ok(sig) => sig.into(),
            Err(LedgerError::Rpc { message, .. }) if message.contains("already been processed") => {
                return Err(LedgerError::Unconfirmed {
                    signature: expected,
                })
            }
            // The request may have reached the node before the connection dropped.
            Err(LedgerError::Timeout) => {
                return Err(LedgerError::Unconfirmed {
                    signature: expected,
                })
            }
            Err(e) => return Err(e),
        };

        for _ in 0..self.config.confirmation_attempts {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.signature_status(&signature).await {
                Ok(Some(SignatureStatus { err: Some(err), .. })) => {
                    return Err(LedgerError::Failed {
                        message: err,
                        logs: vec![],
                    })
                }
                Ok(Some(status)) if status.confirmed => return Ok(signature),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, %signature, "Status poll failed"),
            }
        }

        tracing::warn!(%signature, "Confirmation polling exhausted");
        Err(LedgerError::Unconfirmed {
            signature: Some(signature),
        })
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let response = self
            .client
            .get_signature_statuses_with_history(&[(*signature).into()])
            .await
            .map_err(ledger_error)?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                confirmed: status.satisfies_commitment(self.commitment),
                err: status.err.as_ref().map(error_json),
            }))
    }
}
