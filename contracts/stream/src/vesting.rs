//! Pause-aware linear vesting.
//!
//! Everything here is a pure function of the stream terms and a caller-supplied
//! timestamp. Nothing reads the ledger clock, so results can be replayed for any
//! historical `now`.

use crate::{ContractError, StreamEntry, StreamStatus};

/// Stream time with paused seconds removed.
///
/// While paused the clock freezes at `paused_at`; the pause in progress has not
/// been folded into `accumulated_paused_seconds` yet, so only completed pauses
/// are subtracted.
pub fn effective_time(now: u64, paused_at: Option<u64>, accumulated_paused_seconds: u64) -> u64 {
    paused_at
        .unwrap_or(now)
        .saturating_sub(accumulated_paused_seconds)
}

/// Amount of `total_amount` vested at `effective_now`.
///
/// Linear interpolation over `[start_time, end_time]`, truncated toward zero.
/// The sub-unit remainder stays with the stream until `end_time`, where the
/// full `total_amount` vests.
pub fn vested_amount(
    total_amount: i128,
    start_time: u64,
    end_time: u64,
    effective_now: u64,
) -> Result<i128, ContractError> {
    if total_amount < 0 || start_time >= end_time {
        return Err(ContractError::InvalidParameters);
    }
    if effective_now <= start_time {
        return Ok(0);
    }
    if effective_now >= end_time {
        return Ok(total_amount);
    }

    let elapsed = u128::from(effective_now - start_time);
    let duration = u128::from(end_time - start_time);
    let vested = mul_div_floor(total_amount as u128, elapsed, duration)
        .ok_or(ContractError::Overflow)?;

    i128::try_from(vested).map_err(|_| ContractError::Overflow)
}

/// Vested minus already claimed, never negative.
pub fn claimable_amount(vested: i128, claimed_amount: i128) -> i128 {
    vested.saturating_sub(claimed_amount).max(0)
}

/// `floor(amount * numerator / denominator)` for `numerator < denominator`.
///
/// Splitting `amount = q * denominator + r` keeps every intermediate below
/// `2^128`: `r * numerator < denominator^2 <= 2^128` when both fit in `u64`.
fn mul_div_floor(amount: u128, numerator: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let whole = amount / denominator;
    let remainder = amount % denominator;
    whole
        .checked_mul(numerator)?
        .checked_add(remainder.checked_mul(numerator)? / denominator)
}

impl StreamEntry {
    /// `true` once every deposited unit has been paid to the recipient.
    pub fn is_fully_claimed(&self) -> bool {
        self.claimed_amount == self.total_amount
    }

    pub fn effective_time(&self, now: u64) -> u64 {
        effective_time(now, self.paused_at, self.accumulated_paused_seconds)
    }

    /// Vested amount at `now`.
    ///
    /// Cancelled streams were settled at cancellation, so their vested amount is
    /// whatever the recipient was paid and no longer grows with time.
    pub fn vested_at(&self, now: u64) -> Result<i128, ContractError> {
        match self.status {
            StreamStatus::Cancelled => Ok(self.claimed_amount),
            StreamStatus::Completed => Ok(self.total_amount),
            StreamStatus::Active | StreamStatus::Paused => vested_amount(
                self.total_amount,
                self.start_time,
                self.end_time,
                self.effective_time(now),
            ),
        }
    }

    pub fn claimable_at(&self, now: u64) -> Result<i128, ContractError> {
        Ok(claimable_amount(self.vested_at(now)?, self.claimed_amount))
    }

    /// Elapsed share of the schedule in basis points, capped at 10 000.
    pub fn progress_bps(&self, now: u64) -> u32 {
        let effective = self.effective_time(now);
        if effective <= self.start_time || self.start_time >= self.end_time {
            return 0;
        }
        if effective >= self.end_time {
            return 10_000;
        }
        let elapsed = u128::from(effective - self.start_time);
        let duration = u128::from(self.end_time - self.start_time);
        (elapsed * 10_000 / duration) as u32
    }
}
