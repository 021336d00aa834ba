//! Withdrawn amount resolution.
//!
//! The old chefs do not emit a stable event shape across pools and versions,
//! so the amount actually received is taken from the first matching candidate:
//!
//! 1. a `Withdraw` event for the expected pid;
//! 2. any `Withdraw` event;
//! 3. any event whose name contains "withdraw", ignoring case;
//! 4. the staked amount scaled by `fallback_bps / 10_000`, to absorb an
//!    unknown withdrawal fee.
//!
//! Events without an amount never match. Resolution always produces a value.

use tracing::{debug, warn};

use crate::ledger::{Receipt, ReceiptEvent, U256};

pub const BPS_DENOMINATOR: u64 = 10_000;
/// 99.5% of the staked amount.
pub const DEFAULT_FALLBACK_BPS: u64 = 9_950;

const WITHDRAW_EVENT: &str = "Withdraw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSource {
    MatchingEvent,
    WithdrawEvent,
    LooseEvent,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAmount {
    pub amount: U256,
    pub source: AmountSource,
}

pub fn resolve_amount(
    receipt: &Receipt,
    expected_pid: u64,
    staked_amount: U256,
    fallback_bps: u64,
) -> ResolvedAmount {
    let candidates = [
        (
            AmountSource::MatchingEvent,
            first_with_amount(&receipt.events, |event| {
                is_withdraw(event) && event.pid == Some(expected_pid)
            }),
        ),
        (
            AmountSource::WithdrawEvent,
            first_with_amount(&receipt.events, is_withdraw),
        ),
        (
            AmountSource::LooseEvent,
            first_with_amount(&receipt.events, mentions_withdraw),
        ),
    ];

    for (source, candidate) in candidates {
        if let Some((event, amount)) = candidate {
            debug!(
                pid = expected_pid,
                event = event.name.as_deref().unwrap_or_default(),
                %amount,
                ?source,
                "Resolved withdrawn amount from receipt"
            );
            return ResolvedAmount { amount, source };
        }
    }

    let amount = scale_bps(staked_amount, fallback_bps);
    warn!(
        pid = expected_pid,
        tx_hash = %format!("{:#x}", receipt.tx_hash),
        events = ?receipt.events.iter().map(|event| event.name.as_deref()).collect::<Vec<_>>(),
        %staked_amount,
        %amount,
        "No withdraw event in receipt, falling back to scaled staked amount"
    );
    ResolvedAmount {
        amount,
        source: AmountSource::Heuristic,
    }
}

/// `value * bps / 10_000`, rounding down. Saturates instead of overflowing.
pub fn scale_bps(value: U256, bps: u64) -> U256 {
    let bps = U256::from(bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    match value.checked_mul(bps) {
        Some(scaled) => scaled / denominator,
        None => (value / denominator).saturating_mul(bps),
    }
}

fn first_with_amount<'a>(
    events: &'a [ReceiptEvent],
    matches: impl Fn(&ReceiptEvent) -> bool,
) -> Option<(&'a ReceiptEvent, U256)> {
    events
        .iter()
        .filter(|event| matches(event))
        .find_map(|event| event.amount.map(|amount| (event, amount)))
}

fn is_withdraw(event: &ReceiptEvent) -> bool {
    event.name.as_deref() == Some(WITHDRAW_EVENT)
}

fn mentions_withdraw(event: &ReceiptEvent) -> bool {
    event
        .name
        .as_deref()
        .is_some_and(|name| name.to_ascii_lowercase().contains("withdraw"))
}
