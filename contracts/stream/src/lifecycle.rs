//! Stream state machine.
//!
//! Every transition takes the current entry by reference and returns the next
//! entry (plus whatever the registry has to pay out). Persisting the result and
//! moving funds is the caller's job.

use soroban_sdk::Address;

use crate::{
    CancelSettlement, ContractError, CreateStreamParams, DisplayStatus, StreamAction, StreamEntry,
    StreamStatus,
};

/// Validate creation terms and build the initial `Active` entry.
pub fn create(
    stream_id: u64,
    sender: &Address,
    params: &CreateStreamParams,
) -> Result<StreamEntry, ContractError> {
    if params.total_amount <= 0 {
        return Err(ContractError::InvalidParameters);
    }
    if params.start_time >= params.end_time {
        return Err(ContractError::InvalidParameters);
    }
    if *sender == params.recipient {
        return Err(ContractError::InvalidParameters);
    }

    Ok(StreamEntry {
        stream_id,
        sender: sender.clone(),
        recipient: params.recipient.clone(),
        asset_id: params.asset_id.clone(),
        total_amount: params.total_amount,
        start_time: params.start_time,
        end_time: params.end_time,
        claimed_amount: 0,
        status: StreamStatus::Active,
        paused_at: None,
        accumulated_paused_seconds: 0,
        cancelled_at: None,
        last_claimed_at: None,
    })
}

pub fn pause(entry: &StreamEntry, actor: &Address, now: u64) -> Result<StreamEntry, ContractError> {
    ensure_open(entry)?;
    ensure_actor(&entry.sender, actor)?;
    if entry.status != StreamStatus::Active {
        return Err(ContractError::InvalidState);
    }

    let mut next = entry.clone();
    next.status = StreamStatus::Paused;
    next.paused_at = Some(now);
    Ok(next)
}

/// Fold the finished pause into `accumulated_paused_seconds`.
///
/// A clock that reads earlier than `paused_at` counts as zero paused seconds.
pub fn resume(entry: &StreamEntry, actor: &Address, now: u64) -> Result<StreamEntry, ContractError> {
    ensure_open(entry)?;
    ensure_actor(&entry.sender, actor)?;
    let paused_at = match (entry.status, entry.paused_at) {
        (StreamStatus::Paused, Some(paused_at)) => paused_at,
        _ => return Err(ContractError::InvalidState),
    };

    let mut next = entry.clone();
    next.accumulated_paused_seconds = entry
        .accumulated_paused_seconds
        .checked_add(now.saturating_sub(paused_at))
        .ok_or(ContractError::Overflow)?;
    next.status = StreamStatus::Active;
    next.paused_at = None;
    Ok(next)
}

/// Terminate the stream, settling both parties at `now`.
///
/// The recipient receives everything vested and not yet claimed; the sender is
/// refunded the rest. Both amounts are recorded so that the cancelled entry
/// ends with `claimed_amount` equal to the recipient's lifetime total.
pub fn cancel(
    entry: &StreamEntry,
    actor: &Address,
    now: u64,
) -> Result<(StreamEntry, CancelSettlement), ContractError> {
    ensure_open(entry)?;
    ensure_actor(&entry.sender, actor)?;

    let recipient_amount = payable(entry, now)?;
    let claimed_amount = entry
        .claimed_amount
        .checked_add(recipient_amount)
        .ok_or(ContractError::Overflow)?;
    let sender_refund = entry
        .total_amount
        .checked_sub(claimed_amount)
        .filter(|refund| *refund >= 0)
        .ok_or(ContractError::Overflow)?;

    let mut next = entry.clone();
    next.claimed_amount = claimed_amount;
    next.status = StreamStatus::Cancelled;
    next.paused_at = None;
    next.cancelled_at = Some(now);

    Ok((
        next,
        CancelSettlement {
            recipient_amount,
            sender_refund,
        },
    ))
}

/// Pay out everything claimable at `now`.
pub fn claim(
    entry: &StreamEntry,
    actor: &Address,
    now: u64,
) -> Result<(StreamEntry, i128), ContractError> {
    ensure_open(entry)?;
    ensure_actor(&entry.recipient, actor)?;

    let amount = payable(entry, now)?;
    if amount == 0 {
        return Err(ContractError::NothingToClaim);
    }

    let mut next = entry.clone();
    next.claimed_amount = entry
        .claimed_amount
        .checked_add(amount)
        .filter(|claimed| *claimed <= entry.total_amount)
        .ok_or(ContractError::Overflow)?;
    next.last_claimed_at = Some(now);
    if next.is_fully_claimed() {
        next.status = StreamStatus::Completed;
        next.paused_at = None;
    }

    Ok((next, amount))
}

/// Run the guards of `action` without keeping the result.
pub fn check(
    entry: &StreamEntry,
    action: StreamAction,
    actor: &Address,
    now: u64,
) -> Result<(), ContractError> {
    match action {
        StreamAction::Pause => pause(entry, actor, now).map(|_| ()),
        StreamAction::Resume => resume(entry, actor, now).map(|_| ()),
        StreamAction::Cancel => cancel(entry, actor, now).map(|_| ()),
        StreamAction::Claim => claim(entry, actor, now).map(|_| ()),
    }
}

/// Label shown to users, derived from the persisted status and the clock.
///
/// `Ended` means the schedule has run out but funds are still waiting to be
/// claimed; `Completed` is reserved for streams paid out in full.
pub fn display_status(entry: &StreamEntry, now: u64) -> DisplayStatus {
    match entry.status {
        StreamStatus::Cancelled => DisplayStatus::Cancelled,
        StreamStatus::Completed => DisplayStatus::Completed,
        StreamStatus::Paused => DisplayStatus::Paused,
        StreamStatus::Active => {
            let effective = entry.effective_time(now);
            if effective < entry.start_time {
                DisplayStatus::Pending
            } else if effective >= entry.end_time {
                DisplayStatus::Ended
            } else {
                DisplayStatus::Streaming
            }
        }
    }
}

// Claimable at `now`, refusing a snapshot whose claimed amount lies outside
// `[0, total_amount]` so a payout can never push it further out.
fn payable(entry: &StreamEntry, now: u64) -> Result<i128, ContractError> {
    if entry.claimed_amount < 0 || entry.claimed_amount > entry.total_amount {
        return Err(ContractError::Overflow);
    }
    entry.claimable_at(now)
}

// Cancelled and Completed streams accept no further actions.
fn ensure_open(entry: &StreamEntry) -> Result<(), ContractError> {
    match entry.status {
        StreamStatus::Cancelled | StreamStatus::Completed => Err(ContractError::InvalidState),
        StreamStatus::Active | StreamStatus::Paused => Ok(()),
    }
}

fn ensure_actor(expected: &Address, actor: &Address) -> Result<(), ContractError> {
    if expected == actor {
        Ok(())
    } else {
        Err(ContractError::Unauthorized)
    }
}
