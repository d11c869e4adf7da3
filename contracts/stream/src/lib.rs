#![no_std]

pub mod client;
pub mod lifecycle;
pub mod poll;
pub mod vesting;

use soroban_sdk::{
    contract, contractimpl, contracttype, log, symbol_short, token, Address, Env, String, Symbol,
    Vec,
};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Global configuration for the registry.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub admin: Address,
}

/// Display metadata for a token that streams may be denominated in.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssetInfo {
    pub symbol: String,
    pub decimals: u32,
}

/// Persisted lifecycle state. Whether a stream is fully withdrawn is derived
/// from its amounts, not stored as a separate status.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamStatus {
    Active = 0,
    Paused = 1,
    Completed = 2,
    Cancelled = 3,
}

/// User-facing label computed from a `StreamEntry` and a timestamp.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisplayStatus {
    Pending = 0,
    Streaming = 1,
    Paused = 2,
    Ended = 3,
    Completed = 4,
    Cancelled = 5,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamAction {
    Pause = 0,
    Resume = 1,
    Cancel = 2,
    Claim = 3,
}

#[soroban_sdk::contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    StreamNotFound = 1,
    InvalidState = 2,
    Unauthorized = 3,
    NothingToClaim = 4,
    InvalidParameters = 5,
    Overflow = 6,
    UnsupportedAsset = 7,
    NotInitialized = 8,
}

/// Payload of every per-stream event. The topics carry `(name, stream_id)`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamEvent {
    /// Deposit escrowed at creation.
    Created(i128),
    /// Ledger time the pause started.
    Paused(u64),
    /// Paused seconds accumulated so far, including the pause just ended.
    Resumed(u64),
    Cancelled(CancelSettlement),
    /// Amount paid out by this claim.
    Claimed(i128),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamEntry {
    pub stream_id: u64,
    pub sender: Address,
    pub recipient: Address,
    pub asset_id: Address,
    pub total_amount: i128,
    pub start_time: u64,
    pub end_time: u64,
    pub claimed_amount: i128,
    pub status: StreamStatus,
    pub paused_at: Option<u64>,
    pub accumulated_paused_seconds: u64,
    pub cancelled_at: Option<u64>,
    pub last_claimed_at: Option<u64>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateStreamParams {
    pub recipient: Address,
    pub asset_id: Address,
    pub total_amount: i128,
    pub start_time: u64,
    pub end_time: u64,
}

/// Payouts made when a stream is cancelled.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CancelSettlement {
    pub recipient_amount: i128,
    pub sender_refund: i128,
}

/// Namespace for all contract storage keys.
#[contracttype]
pub enum DataKey {
    Config,            // Instance storage for global settings (admin).
    NextStreamId,      // Instance storage for the auto-incrementing ID counter.
    Asset(Address),    // Persistent storage for supported asset metadata.
    Stream(u64),       // Persistent storage for individual stream data (O(1) lookup).
    IncomingCount(Address),  // Number of streams paying out to a recipient.
    Incoming(Address, u32),  // (recipient, position) -> stream id.
    OutgoingCount(Address),  // Number of streams funded by a sender.
    Outgoing(Address, u32),  // (sender, position) -> stream id.
}

const INSTANCE_TTL_THRESHOLD: u32 = 17280;
const INSTANCE_TTL_EXTEND_TO: u32 = 120960;
const PERSISTENT_TTL_THRESHOLD: u32 = 17280;
const PERSISTENT_TTL_EXTEND_TO: u32 = 120960;

// Token amounts are i128; anything wider than this cannot be rendered.
const MAX_ASSET_DECIMALS: u32 = 38;

/// Upper bound on entries returned by one listing call.
pub const MAX_PAGE_SIZE: u32 = 50;

// ---------------------------------------------------------------------------
// Storage helpers
// ---------------------------------------------------------------------------

fn load_config(env: &Env) -> Result<Config, ContractError> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(ContractError::NotInitialized)
}

fn save_config(env: &Env, config: &Config) {
    env.storage().instance().set(&DataKey::Config, config);
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_TTL_THRESHOLD, INSTANCE_TTL_EXTEND_TO);
}

fn get_stream_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::NextStreamId)
        .unwrap_or(0u64)
}

fn set_stream_count(env: &Env, count: u64) {
    env.storage().instance().set(&DataKey::NextStreamId, &count);
}

fn load_asset(env: &Env, asset_id: &Address) -> Result<AssetInfo, ContractError> {
    env.storage()
        .persistent()
        .get(&DataKey::Asset(asset_id.clone()))
        .ok_or(ContractError::UnsupportedAsset)
}

fn load_stream(env: &Env, stream_id: u64) -> Result<StreamEntry, ContractError> {
    env.storage()
        .persistent()
        .get(&DataKey::Stream(stream_id))
        .ok_or(ContractError::StreamNotFound)
}

fn save_stream(env: &Env, stream: &StreamEntry) {
    let key = DataKey::Stream(stream.stream_id);
    env.storage().persistent().set(&key, stream);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND_TO);
}

// Per-account indexes store one id per entry so that neither appending nor
// paging ever reads the whole list.
type IndexSlot = fn(Address, u32) -> DataKey;

fn index_len(env: &Env, count_key: &DataKey) -> u32 {
    env.storage().persistent().get(count_key).unwrap_or(0u32)
}

fn push_index(env: &Env, count_key: DataKey, slot: IndexSlot, account: &Address, stream_id: u64) {
    let position = index_len(env, &count_key);
    let slot_key = slot(account.clone(), position);

    env.storage().persistent().set(&slot_key, &stream_id);
    env.storage()
        .persistent()
        .extend_ttl(&slot_key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND_TO);
    env.storage().persistent().set(&count_key, &(position + 1));
    env.storage()
        .persistent()
        .extend_ttl(&count_key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND_TO);
}

/// Entries at positions `[start, start + limit)` of an index, with `limit`
/// capped at `MAX_PAGE_SIZE`.
fn load_index_page(
    env: &Env,
    count_key: &DataKey,
    slot: IndexSlot,
    account: &Address,
    start: u32,
    limit: u32,
) -> Result<Vec<StreamEntry>, ContractError> {
    let end = index_len(env, count_key).min(start.saturating_add(limit.min(MAX_PAGE_SIZE)));

    let mut streams = Vec::new(env);
    for position in start..end {
        let stream_id: u64 = env
            .storage()
            .persistent()
            .get(&slot(account.clone(), position))
            .ok_or(ContractError::StreamNotFound)?;
        streams.push_back(load_stream(env, stream_id)?);
    }
    Ok(streams)
}

fn transfer(env: &Env, asset_id: &Address, to: &Address, amount: i128) {
    if amount > 0 {
        token::Client::new(env, asset_id).transfer(&env.current_contract_address(), to, &amount);
    }
}

fn rejected(env: &Env, action: Symbol, stream_id: u64, err: ContractError) -> ContractError {
    log!(env, "transition rejected", action, stream_id, err as u32);
    err
}

// ---------------------------------------------------------------------------
// Internal Helpers
// ---------------------------------------------------------------------------

impl StreamRegistry {
    /// Validate `params`, escrow the deposit and persist an `Active` entry.
    fn open_stream(
        env: &Env,
        sender: &Address,
        params: &CreateStreamParams,
    ) -> Result<u64, ContractError> {
        load_asset(env, &params.asset_id)?;

        let stream_id = get_stream_count(env);
        let entry = lifecycle::create(stream_id, sender, params)?;

        // Only allocate the id and persist state AFTER the escrow transfer;
        // a failed transfer aborts the whole invocation.
        token::Client::new(env, &entry.asset_id).transfer(
            sender,
            &env.current_contract_address(),
            &entry.total_amount,
        );

        set_stream_count(env, stream_id + 1);
        save_stream(env, &entry);
        push_index(
            env,
            DataKey::OutgoingCount(entry.sender.clone()),
            DataKey::Outgoing,
            &entry.sender,
            stream_id,
        );
        push_index(
            env,
            DataKey::IncomingCount(entry.recipient.clone()),
            DataKey::Incoming,
            &entry.recipient,
            stream_id,
        );

        log!(
            env,
            "stream created",
            stream_id,
            entry.total_amount,
            entry.start_time,
            entry.end_time
        );
        env.events().publish(
            (symbol_short!("created"), stream_id),
            StreamEvent::Created(entry.total_amount),
        );

        Ok(stream_id)
    }
}

// ---------------------------------------------------------------------------
// Contract Implementation
// ---------------------------------------------------------------------------

#[contract]
pub struct StreamRegistry;

#[contractimpl]
impl StreamRegistry {
    /// Initialise the registry with its admin address.
    ///
    /// Must be called exactly once. The admin maintains the supported-asset
    /// table and can hand the role over with `set_admin`.
    ///
    /// # Panics
    /// - If called more than once (contract already initialised)
    pub fn init(env: Env, admin: Address) {
        if env.storage().instance().has(&DataKey::Config) {
            panic!("already initialised");
        }
        save_config(&env, &Config { admin });
        set_stream_count(&env, 0);
    }

    /// Add or update a token that streams may be denominated in.
    ///
    /// # Authorization
    /// - Requires authorization from the admin
    ///
    /// # Errors
    /// - `InvalidParameters` if `decimals` exceeds what an `i128` amount can carry
    /// - `NotInitialized` before `init`
    pub fn register_asset(
        env: Env,
        asset_id: Address,
        symbol: String,
        decimals: u32,
    ) -> Result<(), ContractError> {
        let config = load_config(&env)?;
        config.admin.require_auth();

        if decimals > MAX_ASSET_DECIMALS {
            return Err(ContractError::InvalidParameters);
        }

        let key = DataKey::Asset(asset_id.clone());
        env.storage()
            .persistent()
            .set(&key, &AssetInfo { symbol, decimals });
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_TTL_THRESHOLD, PERSISTENT_TTL_EXTEND_TO);

        env.events()
            .publish((symbol_short!("asset"), symbol_short!("added")), asset_id);
        Ok(())
    }

    pub fn get_asset(env: Env, asset_id: Address) -> Result<AssetInfo, ContractError> {
        load_asset(&env, &asset_id)
    }

    /// Create a payment stream and escrow `total_amount` of `asset_id`.
    ///
    /// # Authorization
    /// - Requires authorization from `sender`
    ///
    /// # Errors
    /// - `InvalidParameters` if `total_amount <= 0`, `start_time >= end_time`
    ///   or `sender == recipient`
    /// - `UnsupportedAsset` if the asset was never registered
    ///
    /// # Events
    /// - `created(stream_id)` with `StreamEvent::Created(total_amount)`
    ///
    /// # Examples
    /// - 1000 units over 100 seconds: `total_amount = 1000`, `start = 0`, `end = 100`;
    ///   at `t = 50` the recipient can claim 500
    pub fn create_stream(
        env: Env,
        sender: Address,
        recipient: Address,
        asset_id: Address,
        total_amount: i128,
        start_time: u64,
        end_time: u64,
    ) -> Result<u64, ContractError> {
        sender.require_auth();

        Self::open_stream(
            &env,
            &sender,
            &CreateStreamParams {
                recipient,
                asset_id,
                total_amount,
                start_time,
                end_time,
            },
        )
    }

    /// Create several streams in one transaction.
    ///
    /// Every entry is validated before any funds move; if one is rejected the
    /// whole batch fails and nothing is persisted.
    pub fn create_streams(
        env: Env,
        sender: Address,
        streams: Vec<CreateStreamParams>,
    ) -> Result<Vec<u64>, ContractError> {
        sender.require_auth();

        for (offset, params) in streams.iter().enumerate() {
            load_asset(&env, &params.asset_id)?;
            lifecycle::create(get_stream_count(&env) + offset as u64, &sender, &params)?;
        }

        let mut created_ids = Vec::new(&env);
        for params in streams.iter() {
            created_ids.push_back(Self::open_stream(&env, &sender, &params)?);
        }
        Ok(created_ids)
    }

    /// Pause an active stream. Vesting stops accruing until `resume_stream`.
    ///
    /// # Authorization
    /// - `caller` must authorize and must be the stream's sender
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the sender
    /// - `InvalidState` unless the stream is `Active`
    pub fn pause_stream(env: Env, caller: Address, stream_id: u64) -> Result<(), ContractError> {
        caller.require_auth();
        let stream = load_stream(&env, stream_id)?;

        let now = env.ledger().timestamp();
        let next = lifecycle::pause(&stream, &caller, now)
            .map_err(|err| rejected(&env, symbol_short!("pause"), stream_id, err))?;
        save_stream(&env, &next);

        log!(&env, "stream paused", stream_id, now);
        env.events().publish(
            (symbol_short!("paused"), stream_id),
            StreamEvent::Paused(now),
        );
        Ok(())
    }

    /// Resume a paused stream, excluding the paused interval from vesting.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the sender
    /// - `InvalidState` unless the stream is `Paused`
    pub fn resume_stream(env: Env, caller: Address, stream_id: u64) -> Result<(), ContractError> {
        caller.require_auth();
        let stream = load_stream(&env, stream_id)?;

        let now = env.ledger().timestamp();
        let next = lifecycle::resume(&stream, &caller, now)
            .map_err(|err| rejected(&env, symbol_short!("resume"), stream_id, err))?;
        save_stream(&env, &next);

        log!(
            &env,
            "stream resumed",
            stream_id,
            next.accumulated_paused_seconds
        );
        env.events().publish(
            (symbol_short!("resumed"), stream_id),
            StreamEvent::Resumed(next.accumulated_paused_seconds),
        );
        Ok(())
    }

    /// Cancel a stream and settle both parties at the current ledger time.
    ///
    /// The recipient is paid everything vested but not yet claimed; the sender
    /// is refunded the rest. Cancellation is terminal.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the sender
    /// - `InvalidState` if the stream is already `Cancelled` or `Completed`
    ///
    /// # Examples
    /// - 1000 units over 100s cancelled at t=50 → 500 to recipient, 500 back to sender
    pub fn cancel_stream(
        env: Env,
        caller: Address,
        stream_id: u64,
    ) -> Result<CancelSettlement, ContractError> {
        caller.require_auth();
        let stream = load_stream(&env, stream_id)?;

        let now = env.ledger().timestamp();
        let (next, settlement) = lifecycle::cancel(&stream, &caller, now)
            .map_err(|err| rejected(&env, symbol_short!("cancel"), stream_id, err))?;

        // CEI: update state before external token transfers.
        save_stream(&env, &next);
        transfer(
            &env,
            &next.asset_id,
            &next.recipient,
            settlement.recipient_amount,
        );
        transfer(&env, &next.asset_id, &next.sender, settlement.sender_refund);

        log!(
            &env,
            "stream cancelled",
            stream_id,
            settlement.recipient_amount,
            settlement.sender_refund
        );
        env.events().publish(
            (symbol_short!("cancelled"), stream_id),
            StreamEvent::Cancelled(settlement.clone()),
        );
        Ok(settlement)
    }

    /// Transfer everything claimable right now to the recipient.
    ///
    /// # Returns
    /// - The amount transferred. When this pays out the final unit the stream
    ///   moves to `Completed`.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the recipient
    /// - `InvalidState` if the stream is `Cancelled` or `Completed`
    /// - `NothingToClaim` if nothing has vested since the last claim; retry later
    pub fn claim(env: Env, caller: Address, stream_id: u64) -> Result<i128, ContractError> {
        caller.require_auth();
        let stream = load_stream(&env, stream_id)?;

        let now = env.ledger().timestamp();
        let (next, amount) = lifecycle::claim(&stream, &caller, now)
            .map_err(|err| rejected(&env, symbol_short!("claim"), stream_id, err))?;

        save_stream(&env, &next);
        transfer(&env, &next.asset_id, &next.recipient, amount);

        log!(&env, "stream claimed", stream_id, amount, next.claimed_amount);
        env.events().publish(
            (symbol_short!("claimed"), stream_id),
            StreamEvent::Claimed(amount),
        );
        Ok(amount)
    }

    /// Total vested at the current ledger time, including already-claimed units.
    pub fn calculate_vested(env: Env, stream_id: u64) -> Result<i128, ContractError> {
        load_stream(&env, stream_id)?.vested_at(env.ledger().timestamp())
    }

    pub fn calculate_claimable(env: Env, stream_id: u64) -> Result<i128, ContractError> {
        load_stream(&env, stream_id)?.claimable_at(env.ledger().timestamp())
    }

    /// Claimable amount together with the ledger timestamp it was computed at.
    pub fn will_claim(env: Env, stream_id: u64) -> Result<(i128, u64), ContractError> {
        let now = env.ledger().timestamp();
        let claimable = load_stream(&env, stream_id)?.claimable_at(now)?;
        Ok((claimable, now))
    }

    pub fn display_status(env: Env, stream_id: u64) -> Result<DisplayStatus, ContractError> {
        let stream = load_stream(&env, stream_id)?;
        Ok(lifecycle::display_status(
            &stream,
            env.ledger().timestamp(),
        ))
    }

    pub fn get_stream_state(env: Env, stream_id: u64) -> Result<StreamEntry, ContractError> {
        load_stream(&env, stream_id)
    }

    /// Streams paying out to `recipient`, oldest first.
    ///
    /// Returns at most `min(limit, MAX_PAGE_SIZE)` entries starting at
    /// position `start`; a short page means the end of the list.
    pub fn get_incoming_streams(
        env: Env,
        recipient: Address,
        start: u32,
        limit: u32,
    ) -> Result<Vec<StreamEntry>, ContractError> {
        load_index_page(
            &env,
            &DataKey::IncomingCount(recipient.clone()),
            DataKey::Incoming,
            &recipient,
            start,
            limit,
        )
    }

    /// Streams funded by `sender`, oldest first. Paged like
    /// `get_incoming_streams`.
    pub fn get_outgoing_streams(
        env: Env,
        sender: Address,
        start: u32,
        limit: u32,
    ) -> Result<Vec<StreamEntry>, ContractError> {
        load_index_page(
            &env,
            &DataKey::OutgoingCount(sender.clone()),
            DataKey::Outgoing,
            &sender,
            start,
            limit,
        )
    }

    /// Outgoing streams followed by incoming streams for `account`, paged over
    /// the combined list.
    pub fn get_streams(
        env: Env,
        account: Address,
        start: u32,
        limit: u32,
    ) -> Result<Vec<StreamEntry>, ContractError> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let outgoing_key = DataKey::OutgoingCount(account.clone());
        let mut streams = load_index_page(
            &env,
            &outgoing_key,
            DataKey::Outgoing,
            &account,
            start,
            limit,
        )?;

        let incoming_start = start.saturating_sub(index_len(&env, &outgoing_key));
        let remaining = limit - streams.len();
        streams.append(&load_index_page(
            &env,
            &DataKey::IncomingCount(account.clone()),
            DataKey::Incoming,
            &account,
            incoming_start,
            remaining,
        )?);
        Ok(streams)
    }

    /// Ledger timestamp every time-dependent computation uses.
    pub fn now(env: Env) -> u64 {
        env.ledger().timestamp()
    }

    pub fn get_config(env: Env) -> Result<Config, ContractError> {
        load_config(&env)
    }

    /// Hand the admin role to `new_admin`.
    ///
    /// # Authorization
    /// - Requires authorization from the current admin
    ///
    /// # Events
    /// - Publishes `admin_updated(old_admin, new_admin)`
    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), ContractError> {
        let mut config = load_config(&env)?;
        let old_admin = config.admin.clone();
        old_admin.require_auth();

        config.admin = new_admin.clone();
        save_config(&env, &config);

        env.events().publish(
            (symbol_short!("admin"), symbol_short!("updated")),
            (old_admin, new_admin),
        );
        Ok(())
    }
}
