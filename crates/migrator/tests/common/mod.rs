//! Scripted in-memory chefs for driving the migrator end to end.
//!
//! Submitted calls are recorded and applied to the scripted state the way the
//! contracts would, so a re-run observes the effects of the previous one.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chef_migrator::{
    ContractAddresses, InMemoryCheckpointStore, Ledger, LedgerCall, LedgerError, MigrationConfig,
    Migrator, RetryPolicy,
    ledger::{
        Address, H256, PrimaryPool, PrimaryPoolKind, Receipt, ReceiptEvent, RegularSlot,
        SecondaryPool, SecondaryPoolKind, SecondaryPosition, U256,
    },
};

pub fn account() -> Address {
    Address::from_low_u64_be(0xacc0)
}

pub fn contracts() -> ContractAddresses {
    ContractAddresses {
        old_primary_chef: Address::from_low_u64_be(0x1001),
        new_primary_chef: Address::from_low_u64_be(0x1002),
        old_secondary_chef: Address::from_low_u64_be(0x2001),
        new_secondary_chef: Address::from_low_u64_be(0x2002),
    }
}

pub fn token(pid: u64) -> Address {
    Address::from_low_u64_be(0x7000 + pid)
}

pub const TICKET: Address = Address::repeat_byte(0x77);
pub const CLAIM_PAIR: Address = Address::repeat_byte(0x99);

pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}

pub fn config() -> MigrationConfig {
    MigrationConfig {
        contracts: contracts(),
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..MigrationConfig::default()
    }
}

pub fn migrator(ledger: &Arc<MockLedger>, store: &InMemoryCheckpointStore) -> Migrator {
    Migrator::new(ledger.clone(), Arc::new(store.clone()), config())
}

/// What the old chef's withdraw emits.
#[derive(Debug, Clone)]
pub enum WithdrawEvents {
    /// `Withdraw(user, pid, amount)` with the amount actually paid out.
    Standard,
    /// No decodable event at all.
    None,
    Custom(Vec<ReceiptEvent>),
}

#[derive(Debug, Default)]
pub struct LedgerState {
    pub pool_lengths: HashMap<Address, u64>,
    pub primary_pools: HashMap<(Address, u64), PrimaryPool>,
    pub primary_staked: HashMap<u64, U256>,
    pub staked_tickets: Vec<U256>,
    pub owned_tickets: Vec<U256>,
    pub deposited_tickets: Vec<U256>,
    pub tickets_approved_for_all: bool,
    pub ticket_approvals: HashMap<U256, Address>,
    pub secondary_pools: HashMap<(Address, u64), SecondaryPool>,
    pub secondary_positions: HashMap<u64, SecondaryPosition>,
    pub unlock_times: HashMap<u64, u64>,
    pub regular_slot_lists: HashMap<u64, Vec<U256>>,
    pub regular_slots: HashMap<u64, RegularSlot>,
    pub pending_rewards: HashMap<u64, U256>,
    pub reserves: (U256, U256),
    pub balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    /// Amounts deposited into new chefs, keyed by (chef, pid).
    pub new_deposits: HashMap<(Address, u64), U256>,
    pub chain_time: u64,
    /// Withdrawal fee in basis points kept by the old chefs.
    pub withdraw_fee_bps: u64,
    pub withdraw_events: HashMap<u64, WithdrawEvents>,
    /// Remaining failures per read method name, `u32::MAX` for always.
    pub failing_reads: HashMap<&'static str, u32>,
    /// Call names rejected at submission.
    pub rejected_calls: HashSet<&'static str>,
    /// Call names included with a failed status.
    pub reverted_calls: HashSet<&'static str>,
    pub submitted: Vec<LedgerCall>,
    pub receipts: HashMap<H256, Receipt>,
    pub read_counts: HashMap<&'static str, u32>,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        let ledger = Self::default();
        ledger.with(|state| {
            state.chain_time = 100;
            state.reserves = (ether(100), ether(50));
        });
        Arc::new(ledger)
    }

    pub fn state(&self) -> MutexGuard<'_, LedgerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with<R>(&self, update: impl FnOnce(&mut LedgerState) -> R) -> R {
        update(&mut self.state())
    }

    pub fn submitted(&self) -> Vec<LedgerCall> {
        self.state().submitted.clone()
    }

    pub fn submitted_named(&self, name: &str) -> Vec<LedgerCall> {
        self.submitted()
            .into_iter()
            .filter(|call| call_name(call) == name)
            .collect()
    }

    pub fn balance(&self, token: Address) -> U256 {
        self.state().balances.get(&token).copied().unwrap_or_default()
    }

    pub fn new_deposit(&self, chef: Address, pid: u64) -> U256 {
        self.state()
            .new_deposits
            .get(&(chef, pid))
            .copied()
            .unwrap_or_default()
    }

    pub fn reads(&self, method: &str) -> u32 {
        self.state().read_counts.get(method).copied().unwrap_or_default()
    }

    /// Primary pool `pid` on both chefs, with `staked` held by the account.
    pub fn primary_pool(&self, pid: u64, kind: PrimaryPoolKind, staked: U256, new_alloc: u64) {
        let contracts = contracts();
        self.with(|state| {
            let pool = PrimaryPool {
                kind,
                lp_token: token(pid),
                ticket: TICKET,
                alloc_point: U256::from(100u64),
            };
            state.primary_pools.insert(
                (contracts.new_primary_chef, pid),
                PrimaryPool {
                    alloc_point: U256::from(new_alloc),
                    ..pool.clone()
                },
            );
            state.primary_pools.insert((contracts.old_primary_chef, pid), pool);
            state.primary_staked.insert(pid, staked);
            let count = state.pool_lengths.entry(contracts.old_primary_chef).or_default();
            *count = (*count).max(pid + 1);
        });
    }

    /// Secondary pool `pid` on the old chef and `target` on the new one.
    pub fn secondary_pool(
        &self,
        pid: u64,
        target: u64,
        kind: SecondaryPoolKind,
        deposit: U256,
        new_alloc: u64,
    ) {
        let contracts = contracts();
        self.with(|state| {
            let pool = SecondaryPool {
                kind,
                token: token(pid),
                alloc_point: U256::from(100u64),
                redemption_period: U256::zero(),
            };
            state.secondary_pools.insert(
                (contracts.new_secondary_chef, target),
                SecondaryPool {
                    alloc_point: U256::from(new_alloc),
                    ..pool.clone()
                },
            );
            state
                .secondary_pools
                .insert((contracts.old_secondary_chef, pid), pool);
            state.secondary_positions.insert(
                pid,
                SecondaryPosition {
                    deposit,
                    reward: U256::zero(),
                },
            );
            let count = state
                .pool_lengths
                .entry(contracts.old_secondary_chef)
                .or_default();
            *count = (*count).max(pid + 1);
        });
    }

    fn read<T>(
        &self,
        method: &'static str,
        value: impl FnOnce(&LedgerState) -> T,
    ) -> Result<T, LedgerError> {
        let mut state = self.state();
        *state.read_counts.entry(method).or_default() += 1;
        if let Some(remaining) = state.failing_reads.get_mut(method) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(LedgerError::Transport(format!("{method} unavailable")));
            }
        }
        Ok(value(&state))
    }

    fn apply(state: &mut LedgerState, call: &LedgerCall) -> Vec<ReceiptEvent> {
        match call {
            LedgerCall::PrimaryWithdraw { pid, amount, .. } => {
                state.primary_staked.insert(*pid, U256::zero());
                Self::pay_out(state, *pid, token(*pid), *amount)
            }
            LedgerCall::SecondaryWithdraw { pid, amount, .. } => {
                if let Some(position) = state.secondary_positions.get_mut(pid) {
                    position.deposit = position.deposit.saturating_sub(*amount);
                }
                Self::pay_out(state, *pid, token(*pid), *amount)
            }
            LedgerCall::PrimaryDeposit { chef, pid, amount }
            | LedgerCall::SecondaryDeposit { chef, pid, amount } => {
                let token = state
                    .primary_pools
                    .get(&(*chef, *pid))
                    .map(|pool| pool.lp_token)
                    .or_else(|| state.secondary_pools.get(&(*chef, *pid)).map(|pool| pool.token))
                    .unwrap_or_default();
                let balance = state.balances.entry(token).or_default();
                *balance = balance.saturating_sub(*amount);
                *state.new_deposits.entry((*chef, *pid)).or_default() += *amount;
                vec![ReceiptEvent {
                    name: Some("Deposit".to_owned()),
                    pid: Some(*pid),
                    amount: Some(*amount),
                }]
            }
            LedgerCall::Approve {
                token,
                spender,
                amount,
            } => {
                state.allowances.insert((*token, *spender), *amount);
                Vec::new()
            }
            LedgerCall::WithdrawTicket { ticket_id, .. } => {
                state.staked_tickets.retain(|id| id != ticket_id);
                state.owned_tickets.push(*ticket_id);
                Vec::new()
            }
            LedgerCall::SetTicketApprovalForAll { .. } => {
                state.tickets_approved_for_all = true;
                Vec::new()
            }
            LedgerCall::ApproveTicket {
                operator,
                ticket_id,
                ..
            } => {
                state.ticket_approvals.insert(*ticket_id, *operator);
                Vec::new()
            }
            LedgerCall::DepositAllTickets { .. } => {
                let owned = std::mem::take(&mut state.owned_tickets);
                state.deposited_tickets.extend(owned);
                Vec::new()
            }
            LedgerCall::SafeClaim { pids, .. } => {
                for pid in pids {
                    state.pending_rewards.remove(pid);
                    if let Some(position) = state.secondary_positions.get_mut(pid) {
                        position.reward = U256::zero();
                    }
                }
                Vec::new()
            }
        }
    }

    fn pay_out(state: &mut LedgerState, pid: u64, token: Address, amount: U256) -> Vec<ReceiptEvent> {
        let fee = amount * U256::from(state.withdraw_fee_bps) / U256::from(10_000u64);
        let paid = amount - fee;
        *state.balances.entry(token).or_default() += paid;

        match state
            .withdraw_events
            .get(&pid)
            .cloned()
            .unwrap_or(WithdrawEvents::Standard)
        {
            WithdrawEvents::Standard => vec![ReceiptEvent {
                name: Some("Withdraw".to_owned()),
                pid: Some(pid),
                amount: Some(paid),
            }],
            WithdrawEvents::None => vec![ReceiptEvent::default()],
            WithdrawEvents::Custom(events) => events,
        }
    }
}

pub fn call_name(call: &LedgerCall) -> &'static str {
    match call {
        LedgerCall::PrimaryWithdraw { .. } => "primary_withdraw",
        LedgerCall::PrimaryDeposit { .. } => "primary_deposit",
        LedgerCall::SecondaryWithdraw { .. } => "secondary_withdraw",
        LedgerCall::SecondaryDeposit { .. } => "secondary_deposit",
        LedgerCall::Approve { .. } => "approve",
        LedgerCall::WithdrawTicket { .. } => "withdraw_ticket",
        LedgerCall::SetTicketApprovalForAll { .. } => "set_ticket_approval_for_all",
        LedgerCall::ApproveTicket { .. } => "approve_ticket",
        LedgerCall::DepositAllTickets { .. } => "deposit_all_tickets",
        LedgerCall::SafeClaim { .. } => "safe_claim",
    }
}

#[async_trait::async_trait]
impl Ledger for MockLedger {
    async fn pool_length(&self, chef: Address) -> Result<u64, LedgerError> {
        self.read("pool_length", |state| {
            state.pool_lengths.get(&chef).copied().unwrap_or_default()
        })
    }

    async fn primary_pool(&self, chef: Address, pid: u64) -> Result<PrimaryPool, LedgerError> {
        self.read("primary_pool", |state| {
            state
                .primary_pools
                .get(&(chef, pid))
                .cloned()
                .unwrap_or(PrimaryPool {
                    kind: PrimaryPoolKind::Standard,
                    lp_token: token(pid),
                    ticket: TICKET,
                    alloc_point: U256::zero(),
                })
        })
    }

    async fn primary_staked(
        &self,
        _chef: Address,
        pid: u64,
        _account: Address,
    ) -> Result<U256, LedgerError> {
        self.read("primary_staked", |state| {
            state.primary_staked.get(&pid).copied().unwrap_or_default()
        })
    }

    async fn staked_tickets(
        &self,
        _chef: Address,
        _account: Address,
        _ticket: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        self.read("staked_tickets", |state| state.staked_tickets.clone())
    }

    async fn secondary_pool(&self, chef: Address, pid: u64) -> Result<SecondaryPool, LedgerError> {
        self.read("secondary_pool", |state| {
            state
                .secondary_pools
                .get(&(chef, pid))
                .cloned()
                .unwrap_or(SecondaryPool {
                    kind: SecondaryPoolKind::Flexible,
                    token: token(pid),
                    alloc_point: U256::zero(),
                    redemption_period: U256::zero(),
                })
        })
    }

    async fn secondary_position(
        &self,
        _chef: Address,
        pid: u64,
        _account: Address,
    ) -> Result<SecondaryPosition, LedgerError> {
        self.read("secondary_position", |state| {
            state.secondary_positions.get(&pid).cloned().unwrap_or_default()
        })
    }

    async fn unlock_time(
        &self,
        _chef: Address,
        pid: u64,
        _account: Address,
    ) -> Result<u64, LedgerError> {
        self.read("unlock_time", |state| {
            state.unlock_times.get(&pid).copied().unwrap_or_default()
        })
    }

    async fn regular_slots(
        &self,
        _chef: Address,
        pid: u64,
        _account: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        self.read("regular_slots", |state| {
            state.regular_slot_lists.get(&pid).cloned().unwrap_or_default()
        })
    }

    async fn regular_slot(
        &self,
        _chef: Address,
        _account: Address,
        slot: u64,
    ) -> Result<RegularSlot, LedgerError> {
        self.read("regular_slot", |state| state.regular_slots.get(&slot).cloned())?
            .ok_or_else(|| LedgerError::Rpc(format!("no regular slot {slot}")))
    }

    async fn pending_reward(
        &self,
        _chef: Address,
        pid: u64,
        _account: Address,
    ) -> Result<U256, LedgerError> {
        self.read("pending_reward", |state| {
            state.pending_rewards.get(&pid).copied().unwrap_or_default()
        })
    }

    async fn claim_pair(&self, _chef: Address) -> Result<Address, LedgerError> {
        self.read("claim_pair", |_| CLAIM_PAIR)
    }

    async fn pair_reserves(&self, _pair: Address) -> Result<(U256, U256), LedgerError> {
        self.read("pair_reserves", |state| state.reserves)
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256, LedgerError> {
        self.read("token_balance", |state| {
            state.balances.get(&token).copied().unwrap_or_default()
        })
    }

    async fn token_allowance(
        &self,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        self.read("token_allowance", |state| {
            state
                .allowances
                .get(&(token, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    async fn owned_tickets(
        &self,
        _ticket: Address,
        _owner: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        self.read("owned_tickets", |state| state.owned_tickets.clone())
    }

    async fn tickets_approved_for_all(
        &self,
        _ticket: Address,
        _owner: Address,
        _operator: Address,
    ) -> Result<bool, LedgerError> {
        self.read("tickets_approved_for_all", |state| state.tickets_approved_for_all)
    }

    async fn ticket_approved(
        &self,
        _ticket: Address,
        ticket_id: U256,
    ) -> Result<Address, LedgerError> {
        self.read("ticket_approved", |state| {
            state
                .ticket_approvals
                .get(&ticket_id)
                .copied()
                .unwrap_or_default()
        })
    }

    async fn chain_time(&self) -> Result<u64, LedgerError> {
        self.read("chain_time", |state| state.chain_time)
    }

    async fn submit(&self, call: &LedgerCall) -> Result<H256, LedgerError> {
        let mut state = self.state();
        let name = call_name(call);
        if state.rejected_calls.contains(name) {
            return Err(LedgerError::Rpc(format!("{name} rejected")));
        }

        state.submitted.push(call.clone());
        let tx_hash = H256::from_low_u64_be(u64::try_from(state.submitted.len()).unwrap_or_default());
        let status = !state.reverted_calls.contains(name);
        let events = if status {
            Self::apply(&mut state, call)
        } else {
            Vec::new()
        };
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                status,
                events,
            },
        );
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Receipt, LedgerError> {
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(LedgerError::ReceiptUnavailable(tx_hash))
    }
}
