//! Ledger wire types

use crate::address::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failures raised by a ledger client or signer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Signer refused to sign
    #[error("Signer declined: {0}")]
    Rejected(String),
    #[error("Request timed out")]
    Timeout,
    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        logs: Vec<String>,
    },
    /// Executed and failed
    #[error("Transaction failed: {message}")]
    Failed { message: String, logs: Vec<String> },
    /// Submitted, but no clear success or failure verdict
    #[error("Submission outcome unknown")]
    Unconfirmed { signature: Option<Signature> },
    /// Response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl LedgerError {
    /// Program logs attached to the failure
    pub fn logs(&self) -> &[String] {
        match self {
            Self::Rpc { logs, .. } | Self::Failed { logs, .. } => logs,
            _ => &[],
        }
    }
}

/// Raw account as stored on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    /// Native balance
    pub lamports: u64,
    /// Program that owns the account
    pub owner: Address,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// Result of dry-running a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    /// Serialized error, `None` on success
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Known status of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    /// Reached the requested commitment
    pub confirmed: bool,
    /// Execution error, if it failed
    pub err: Option<String>,
}

macro_rules! base58_bytes {
    ($name:ident, $len:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = bs58::decode(s)
                    .into_vec()
                    .map_err(|e| LedgerError::Malformed(format!("{s}: {e}")))?;
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    LedgerError::Malformed(format!("{s}: expected {} bytes", $len))
                })?;
                Ok(Self(arr))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_bytes!(
    Signature,
    64,
    "Transaction signature, doubles as the submission identifier"
);
base58_bytes!(Blockhash, 32, "Recent blockhash bounding a submission's lifetime");

impl From<solana_sdk::signature::Signature> for Signature {
    fn from(sig: solana_sdk::signature::Signature) -> Self {
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(sig.as_ref());
        Self(bytes)
    }
}

impl From<Signature> for solana_sdk::signature::Signature {
    fn from(sig: Signature) -> Self {
        Self::from(sig.0)
    }
}

impl From<solana_sdk::hash::Hash> for Blockhash {
    fn from(hash: solana_sdk::hash::Hash) -> Self {
        Self(hash.to_bytes())
    }
}

impl From<Blockhash> for solana_sdk::hash::Hash {
    fn from(hash: Blockhash) -> Self {
        Self::new_from_array(hash.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let sig = Signature::new([7; 64]);
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn test_sdk_conversions_keep_text_form() {
        let sig = Signature::new([7; 64]);
        let sdk = solana_sdk::signature::Signature::from(sig);
        assert_eq!(sdk.to_string(), sig.to_string());
        assert_eq!(Signature::from(sdk), sig);

        let hash = Blockhash::new([3; 32]);
        let sdk = solana_sdk::hash::Hash::from(hash);
        assert_eq!(sdk.to_string(), hash.to_string());
        assert_eq!(Blockhash::from(sdk), hash);
    }

    #[test]
    fn test_blockhash_rejects_wrong_length() {
        assert!(matches!(
            "3yZe7d".parse::<Blockhash>(),
            Err(LedgerError::Malformed(_))
        ));
    }

    #[test]
    fn test_logs_accessor() {
        let err = LedgerError::Failed {
            message: "boom".into(),
            logs: vec!["Program log: boom".into()],
        };
        assert_eq!(err.logs().len(), 1);
        assert!(LedgerError::Timeout.logs().is_empty());
    }
}
