//! Simulate, sign, submit and confirm one instruction batch

use super::EngineContext;
use crate::address::Address;
use crate::error::{classify, classify_message, EngineError};
use crate::ledger::{compile_message, Instruction, LedgerError, Signature, Transaction};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use std::time::Instant;

/// Evidence that an ambiguous submission landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Only the signature status can tell
    Signature,
    /// The submission creates this account
    Account(Address),
}

/// Run `instructions` as one transaction paid and signed by the context's
/// identity
///
/// A failed simulation is classified and returned before the signer is
/// asked for anything. A submission whose verdict is lost is polled
/// through `expect` for a bounded number of attempts.
pub async fn submit(
    ctx: &EngineContext,
    instructions: &[Instruction],
    expect: Expectation,
) -> Result<Signature, EngineError> {
    if ctx.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let payer = ctx.identity();
    let error_context = ctx.settings.error_context;

    let blockhash = retry_with_backoff(
        &ctx.settings.retry,
        ctx.cancel.as_ref(),
        EngineError::is_retryable,
        || async {
            ctx.ledger
                .latest_blockhash()
                .await
                .map_err(|e| classify(&e, error_context))
        },
    )
    .await?;

    let message = compile_message(&payer, instructions, blockhash)
        .map_err(|e| EngineError::Unknown(e.to_string()))?;
    let mut transaction = Transaction::new_unsigned(message);

    let start = Instant::now();
    let simulation = ctx
        .ledger
        .simulate(&transaction)
        .await
        .map_err(|e| classify(&e, error_context))?;
    telemetry::record_latency(LatencyMetric::Simulation, start.elapsed());
    if let Some(err) = &simulation.err {
        let classified = classify_message(err, &simulation.logs, error_context);
        tracing::warn!(
            %payer,
            error = %classified,
            instructions = instructions.len(),
            "Simulation rejected batch"
        );
        telemetry::increment(CounterMetric::Submissions, "simulation_failed");
        return Err(classified);
    }
    tracing::debug!(units = ?simulation.units_consumed, "Simulation passed");

    let signature = ctx
        .signer
        .sign_message(&transaction.message.serialize())
        .await
        .map_err(|e| classify(&e, error_context))?;
    transaction.signatures = vec![signature.into()];

    let start = Instant::now();
    let result = ctx.ledger.submit_and_confirm(&transaction).await;
    telemetry::record_latency(LatencyMetric::Submission, start.elapsed());

    match result {
        Ok(confirmed) => {
            tracing::info!(signature = %confirmed, "Submission confirmed");
            telemetry::increment(CounterMetric::Submissions, "confirmed");
            Ok(confirmed)
        }
        Err(LedgerError::Unconfirmed { signature: reported }) => {
            let pending = reported.unwrap_or(signature);
            tracing::warn!(signature = %pending, "Submission outcome unknown, polling");
            let outcome = await_landing(ctx, &pending, expect).await;
            telemetry::increment(
                CounterMetric::Submissions,
                if outcome.is_ok() { "recovered" } else { "unconfirmed" },
            );
            outcome
        }
        Err(e) => {
            let classified = classify(&e, error_context);
            tracing::warn!(%signature, error = %classified, "Submission failed");
            telemetry::increment(CounterMetric::Submissions, classified.kind());
            Err(classified)
        }
    }
}

/// Poll until the submission is seen to land or fail, or polls run out
async fn await_landing(
    ctx: &EngineContext,
    signature: &Signature,
    expect: Expectation,
) -> Result<Signature, EngineError> {
    let policy = RetryPolicy::new(
        ctx.settings.confirmation_interval,
        ctx.settings.confirmation_interval * 4,
        ctx.settings.confirmation_attempts,
    );
    let error_context = ctx.settings.error_context;

    let polled = retry_with_backoff(
        &policy,
        ctx.cancel.as_ref(),
        |e: &EngineError| matches!(e, EngineError::Unconfirmed) || e.is_retryable(),
        || async {
            let status = ctx
                .ledger
                .signature_status(signature)
                .await
                .map_err(|e| classify(&e, error_context))?;
            if let Some(status) = status {
                if let Some(err) = status.err {
                    return Err(classify_message(&err, &[], error_context));
                }
                if status.confirmed {
                    return Ok(*signature);
                }
            }
            if let Expectation::Account(address) = expect {
                let account = ctx
                    .ledger
                    .get_account(&address)
                    .await
                    .map_err(|e| classify(&e, error_context))?;
                if account.is_some() {
                    return Ok(*signature);
                }
            }
            Err(EngineError::Unconfirmed)
        },
    )
    .await;

    match polled {
        Ok(landed) => {
            tracing::info!(signature = %landed, "Ambiguous submission landed");
            Ok(landed)
        }
        Err(e) => {
            let err = EngineError::from(e);
            let err = if err.is_retryable() {
                EngineError::Unconfirmed
            } else {
                err
            };
            tracing::warn!(%signature, error = %err, "Gave up on ambiguous submission");
            Err(err)
        }
    }
}
