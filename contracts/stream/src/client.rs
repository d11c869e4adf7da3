//! Caller-side view of the registry.
//!
//! `ChainClient` is the seam between off-registry code (UIs, operators, other
//! contracts) and wherever the authoritative entries live. Transitions are
//! checked locally with [`precheck`] before submission so obvious rejections
//! never reach the chain; the registry still re-checks every one of them.

use soroban_sdk::Address;

use crate::{
    lifecycle, CancelSettlement, ContractError, StreamAction, StreamEntry, StreamRegistryClient,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientError {
    NotFound,
    /// Transport or host failure; the transition may be retried.
    Unavailable,
    /// The registry refused the transition.
    Rejected(ContractError),
}

impl ClientError {
    /// `Unavailable` is worth retrying with backoff, and so is
    /// `NothingToClaim` once more time has passed. Everything else is a rule
    /// violation to surface to the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Unavailable | ClientError::Rejected(ContractError::NothingToClaim)
        )
    }
}

impl From<ContractError> for ClientError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::StreamNotFound => ClientError::NotFound,
            other => ClientError::Rejected(other),
        }
    }
}

/// What a successful transition produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TxReceipt {
    Paused,
    Resumed,
    Cancelled(CancelSettlement),
    Claimed(i128),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    Success(TxReceipt),
    Failure(ClientError),
}

/// Ticket for a submitted transition, redeemed with `await_result`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionHandle {
    pub stream_id: u64,
    pub action: StreamAction,
    outcome: TxOutcome,
}

pub trait ChainClient {
    fn get_entry(&self, stream_id: u64) -> Result<StreamEntry, ClientError>;

    fn get_current_time(&self) -> Result<u64, ClientError>;

    fn submit_transition(
        &self,
        stream_id: u64,
        action: StreamAction,
        actor: &Address,
    ) -> Result<TransactionHandle, ClientError>;

    fn await_result(&self, handle: TransactionHandle) -> TxOutcome;
}

/// Apply the state-machine guards for `action` to a snapshot.
pub fn precheck(
    entry: &StreamEntry,
    action: StreamAction,
    actor: &Address,
    now: u64,
) -> Result<(), ClientError> {
    lifecycle::check(entry, action, actor, now).map_err(ClientError::from)
}

/// Fetch a fresh snapshot, precheck `action` against it and submit.
pub fn submit_checked<C: ChainClient>(
    client: &C,
    stream_id: u64,
    action: StreamAction,
    actor: &Address,
) -> Result<TransactionHandle, ClientError> {
    let entry = client.get_entry(stream_id)?;
    let now = client.get_current_time()?;
    precheck(&entry, action, actor, now)?;
    client.submit_transition(stream_id, action, actor)
}

/// `ChainClient` backed by a deployed `StreamRegistry`.
///
/// Soroban invocations complete atomically within the call, so the handle
/// already carries the final outcome.
pub struct RegistryChainClient<'a> {
    registry: StreamRegistryClient<'a>,
}

impl<'a> RegistryChainClient<'a> {
    pub fn new(registry: StreamRegistryClient<'a>) -> Self {
        Self { registry }
    }

    fn invoke(&self, stream_id: u64, action: StreamAction, actor: &Address) -> TxOutcome {
        let receipt = match action {
            StreamAction::Pause => {
                settle(self.registry.try_pause_stream(actor, &stream_id)).map(|_| TxReceipt::Paused)
            }
            StreamAction::Resume => settle(self.registry.try_resume_stream(actor, &stream_id))
                .map(|_| TxReceipt::Resumed),
            StreamAction::Cancel => settle(self.registry.try_cancel_stream(actor, &stream_id))
                .map(TxReceipt::Cancelled),
            StreamAction::Claim => {
                settle(self.registry.try_claim(actor, &stream_id)).map(TxReceipt::Claimed)
            }
        };
        match receipt {
            Ok(receipt) => TxOutcome::Success(receipt),
            Err(err) => TxOutcome::Failure(err),
        }
    }
}

impl ChainClient for RegistryChainClient<'_> {
    fn get_entry(&self, stream_id: u64) -> Result<StreamEntry, ClientError> {
        settle(self.registry.try_get_stream_state(&stream_id))
    }

    fn get_current_time(&self) -> Result<u64, ClientError> {
        match self.registry.try_now() {
            Ok(Ok(now)) => Ok(now),
            _ => Err(ClientError::Unavailable),
        }
    }

    fn submit_transition(
        &self,
        stream_id: u64,
        action: StreamAction,
        actor: &Address,
    ) -> Result<TransactionHandle, ClientError> {
        Ok(TransactionHandle {
            stream_id,
            action,
            outcome: self.invoke(stream_id, action, actor),
        })
    }

    fn await_result(&self, handle: TransactionHandle) -> TxOutcome {
        handle.outcome
    }
}

// Contract errors are domain rejections; conversion and host failures are not.
fn settle<T, C, H>(
    result: Result<Result<T, C>, Result<ContractError, H>>,
) -> Result<T, ClientError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Err(Ok(err)) => Err(err.into()),
        Ok(Err(_)) | Err(Err(_)) => Err(ClientError::Unavailable),
    }
}
