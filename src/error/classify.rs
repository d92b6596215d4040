//! Raw failure classification
//!
//! Pure functions: the same failure text always lands in the same variant.
//! Checks run in taxonomy priority order, first match wins.

use super::{EngineError, ErrorContext, ProgramErrorCode};
use crate::ledger::LedgerError;

/// Longest unknown message surfaced outside development
pub const MAX_MESSAGE_LEN: usize = 256;

const REJECTION_MARKERS: &[&str] = &[
    "User rejected",
    "user rejected",
    "Transaction rejected",
    "Signer declined",
];
const STALE_MARKERS: &[&str] = &[
    "Blockhash not found",
    "BlockhashNotFound",
    "block height exceeded",
];
const RATE_LIMIT_MARKERS: &[&str] = &[
    "Too Many Requests",
    "status 429",
    "HTTP 429",
    "rate limit",
    "Rate limit",
];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "Timeout", "timed out", "ETIMEDOUT"];
const NETWORK_MARKERS: &[&str] = &[
    "Failed to fetch",
    "NetworkError",
    "ECONNREFUSED",
    "Connection refused",
    "connection refused",
    "error sending request",
    "dns error",
];
const NOT_FOUND_MARKERS: &[&str] = &[
    "Account does not exist",
    "could not find account",
    "AccountNotFound",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a ledger or signer failure
pub fn classify(err: &LedgerError, context: ErrorContext) -> EngineError {
    match err {
        LedgerError::Rejected(_) => EngineError::UserRejected,
        LedgerError::Http { status: 429, .. } => EngineError::RateLimited,
        LedgerError::Http {
            status: 500..=599, ..
        } => EngineError::NetworkUnavailable,
        LedgerError::Timeout => EngineError::Timeout,
        LedgerError::Unconfirmed { .. } => EngineError::Unconfirmed,
        other => classify_message(&other.to_string(), other.logs(), context),
    }
}

/// Classify free-form failure text plus any program logs
pub fn classify_message(message: &str, logs: &[String], context: ErrorContext) -> EngineError {
    if contains_any(message, REJECTION_MARKERS) {
        return EngineError::UserRejected;
    }
    if contains_any(message, STALE_MARKERS) {
        return EngineError::StaleSubmission;
    }
    if contains_any(message, RATE_LIMIT_MARKERS) {
        return EngineError::RateLimited;
    }
    if contains_any(message, TIMEOUT_MARKERS) {
        return EngineError::Timeout;
    }
    if contains_any(message, NETWORK_MARKERS) {
        return EngineError::NetworkUnavailable;
    }

    let program_error = std::iter::once(message)
        .chain(logs.iter().map(String::as_str))
        .find_map(program_error_in);
    if let Some(err) = program_error {
        return err;
    }

    if contains_any(message, NOT_FOUND_MARKERS) {
        return EngineError::AccountNotFound;
    }

    EngineError::Unknown(bounded_message(message, logs, context))
}

fn program_error_in(text: &str) -> Option<EngineError> {
    if let Some(code) = hex_code(text).or_else(|| custom_code(text)) {
        return Some(match ProgramErrorCode::from_code(code) {
            Some(known) => EngineError::Program(known),
            None => EngineError::UnmappedProgramError(code),
        });
    }
    named_code(text).map(EngineError::Program)
}

/// `custom program error: 0x1770`
fn hex_code(text: &str) -> Option<u32> {
    let marker = "custom program error: 0x";
    let start = text.find(marker)? + marker.len();
    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    u32::from_str_radix(&digits, 16).ok()
}

/// `{"Custom":6003}` as found in serialized instruction errors
fn custom_code(text: &str) -> Option<u32> {
    let marker = "\"Custom\"";
    let rest = &text[text.find(marker)? + marker.len()..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// `Error Code: MarketExpired` as printed in program logs
fn named_code(text: &str) -> Option<ProgramErrorCode> {
    let marker = "Error Code: ";
    let rest = &text[text.find(marker)? + marker.len()..];
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    ProgramErrorCode::from_name(&name)
}

fn bounded_message(message: &str, logs: &[String], context: ErrorContext) -> String {
    match context {
        ErrorContext::Development if logs.is_empty() => message.to_string(),
        ErrorContext::Development => format!("{message}\n{}", logs.join("\n")),
        ErrorContext::Production => {
            if message.chars().count() > MAX_MESSAGE_LEN {
                let cut: String = message.chars().take(MAX_MESSAGE_LEN).collect();
                format!("{cut}...")
            } else {
                message.to_string()
            }
        }
    }
}
