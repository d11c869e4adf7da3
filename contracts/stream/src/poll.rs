//! Read-only claimable tracking for display loops.
//!
//! A UI refreshing once per second owns a `ClaimPoller` and feeds it whatever
//! clock it has. Readings never move backwards: an earlier `now` than the last
//! one observed is clamped to the last one.

use crate::client::{ChainClient, ClientError};
use crate::{lifecycle, ContractError, DisplayStatus, StreamEntry};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimSnapshot {
    pub stream_id: u64,
    pub observed_at: u64,
    pub vested: i128,
    pub claimable: i128,
    pub progress_bps: u32,
    pub display_status: DisplayStatus,
}

#[derive(Clone, Debug, Default)]
pub struct ClaimPoller {
    last_now: Option<u64>,
}

impl ClaimPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_observed(&self) -> Option<u64> {
        self.last_now
    }

    /// Compute a snapshot of `entry` at `now`, clamped to the latest reading.
    pub fn observe(&mut self, entry: &StreamEntry, now: u64) -> Result<ClaimSnapshot, ContractError> {
        let now = self.last_now.map_or(now, |last| last.max(now));
        self.last_now = Some(now);

        let vested = entry.vested_at(now)?;
        Ok(ClaimSnapshot {
            stream_id: entry.stream_id,
            observed_at: now,
            vested,
            claimable: crate::vesting::claimable_amount(vested, entry.claimed_amount),
            progress_bps: entry.progress_bps(now),
            display_status: lifecycle::display_status(entry, now),
        })
    }

    /// Fetch the entry and chain time from `client` and observe them.
    pub fn poll<C: ChainClient>(
        &mut self,
        client: &C,
        stream_id: u64,
    ) -> Result<ClaimSnapshot, ClientError> {
        let entry = client.get_entry(stream_id)?;
        let now = client.get_current_time()?;
        self.observe(&entry, now).map_err(ClientError::from)
    }
}
