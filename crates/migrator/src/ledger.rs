// Ledger API consumed by the migrator

use std::fmt::{self, Display};

pub use ethereum_types::{Address, H256, U256};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Decoding error: {0}")]
    Decode(String),
    #[error("Receipt for transaction {0:#x} not available")]
    ReceiptUnavailable(H256),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryPoolKind {
    Standard,
    /// VIP pool: staking also requires ticket NFTs.
    Ticket,
    Other(u8),
}

impl From<u8> for PrimaryPoolKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Standard,
            1 => Self::Ticket,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryPoolKind {
    Flexible,
    /// Deposits are split into redemption slots with their own time windows.
    Regular,
    Other(u8),
}

impl SecondaryPoolKind {
    pub fn code(&self) -> u8 {
        match self {
            Self::Flexible => 0,
            Self::Regular => 1,
            Self::Other(code) => *code,
        }
    }
}

impl From<u8> for SecondaryPoolKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Flexible,
            1 => Self::Regular,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryPool {
    pub kind: PrimaryPoolKind,
    pub lp_token: Address,
    pub ticket: Address,
    pub alloc_point: U256,
}

impl PrimaryPool {
    pub fn is_active(&self) -> bool {
        !self.alloc_point.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryPool {
    pub kind: SecondaryPoolKind,
    pub token: Address,
    pub alloc_point: U256,
    pub redemption_period: U256,
}

impl SecondaryPool {
    pub fn is_active(&self) -> bool {
        !self.alloc_point.is_zero()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryPosition {
    pub deposit: U256,
    pub reward: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegularSlot {
    pub redemption_start: u64,
    pub redemption_end: u64,
    pub amount: U256,
}

/// A log emitted by a transaction, decoded as far as the adapter could.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptEvent {
    pub name: Option<String>,
    pub pid: Option<u64>,
    pub amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: H256,
    pub status: bool,
    pub events: Vec<ReceiptEvent>,
}

/// Every state-mutating call the migrator can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    PrimaryWithdraw {
        chef: Address,
        pid: u64,
        amount: U256,
    },
    PrimaryDeposit {
        chef: Address,
        pid: u64,
        amount: U256,
    },
    SecondaryWithdraw {
        chef: Address,
        pid: u64,
        amount: U256,
        regular_ids: Vec<u64>,
    },
    SecondaryDeposit {
        chef: Address,
        pid: u64,
        amount: U256,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    WithdrawTicket {
        chef: Address,
        pid: u64,
        ticket_id: U256,
    },
    SetTicketApprovalForAll {
        ticket: Address,
        operator: Address,
    },
    ApproveTicket {
        ticket: Address,
        operator: Address,
        ticket_id: U256,
    },
    DepositAllTickets {
        chef: Address,
        ticket: Address,
    },
    SafeClaim {
        chef: Address,
        min_reserves: [U256; 4],
        pids: Vec<u64>,
        amounts: Vec<U256>,
        lp_pid: u64,
        account: Address,
    },
}

impl LedgerCall {
    /// Contract the call is sent to.
    pub fn target(&self) -> Address {
        match self {
            Self::PrimaryWithdraw { chef, .. }
            | Self::PrimaryDeposit { chef, .. }
            | Self::SecondaryWithdraw { chef, .. }
            | Self::SecondaryDeposit { chef, .. }
            | Self::WithdrawTicket { chef, .. }
            | Self::DepositAllTickets { chef, .. }
            | Self::SafeClaim { chef, .. } => *chef,
            Self::Approve { token, .. } => *token,
            Self::SetTicketApprovalForAll { ticket, .. } | Self::ApproveTicket { ticket, .. } => {
                *ticket
            }
        }
    }
}

impl Display for LedgerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryWithdraw { pid, amount, .. } => {
                write!(f, "withdraw(pid={pid}, amount={amount})")
            }
            Self::PrimaryDeposit { pid, amount, .. } => {
                write!(f, "deposit(pid={pid}, amount={amount})")
            }
            Self::SecondaryWithdraw {
                pid,
                amount,
                regular_ids,
                ..
            } => write!(
                f,
                "withdraw(pid={pid}, amount={amount}, regular_ids={regular_ids:?})"
            ),
            Self::SecondaryDeposit { pid, amount, .. } => {
                write!(f, "deposit(pid={pid}, amount={amount})")
            }
            Self::Approve {
                token,
                spender,
                amount,
            } => write!(f, "approve(token={token:#x}, spender={spender:#x}, amount={amount})"),
            Self::WithdrawTicket { pid, ticket_id, .. } => {
                write!(f, "withdraw_tickets(pid={pid}, ticket_id={ticket_id})")
            }
            Self::SetTicketApprovalForAll { ticket, operator } => {
                write!(f, "setApprovalForAll(ticket={ticket:#x}, operator={operator:#x})")
            }
            Self::ApproveTicket {
                ticket, ticket_id, ..
            } => write!(f, "approve(ticket={ticket:#x}, ticket_id={ticket_id})"),
            Self::DepositAllTickets { ticket, .. } => {
                write!(f, "deposit_all_tickets(ticket={ticket:#x})")
            }
            Self::SafeClaim { pids, amounts, .. } => {
                write!(f, "safeClaim(pids={pids:?}, amounts={amounts:?})")
            }
        }
    }
}

// We need async_trait because the migrator holds the ledger as `dyn Ledger`
// in the CLI and the stabilized feature lacks object safety.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Number of pools registered on a chef contract.
    async fn pool_length(&self, chef: Address) -> Result<u64, LedgerError>;

    async fn primary_pool(&self, chef: Address, pid: u64) -> Result<PrimaryPool, LedgerError>;

    /// LP amount `account` has staked in a primary pool.
    async fn primary_staked(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<U256, LedgerError>;

    /// Ticket ids `account` has staked on the primary chef for `ticket`.
    async fn staked_tickets(
        &self,
        chef: Address,
        account: Address,
        ticket: Address,
    ) -> Result<Vec<U256>, LedgerError>;

    async fn secondary_pool(&self, chef: Address, pid: u64) -> Result<SecondaryPool, LedgerError>;

    async fn secondary_position(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<SecondaryPosition, LedgerError>;

    /// Timestamp after which `account` may withdraw from a time-locked pool without fee.
    async fn unlock_time(&self, chef: Address, pid: u64, account: Address)
    -> Result<u64, LedgerError>;

    /// Packed redemption slot values for a regular pool.
    async fn regular_slots(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<Vec<U256>, LedgerError>;

    async fn regular_slot(
        &self,
        chef: Address,
        account: Address,
        slot: u64,
    ) -> Result<RegularSlot, LedgerError>;

    /// Live incentive accrued but not yet written to the position.
    async fn pending_reward(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<U256, LedgerError>;

    /// Liquidity pair used to price reward claims.
    async fn claim_pair(&self, chef: Address) -> Result<Address, LedgerError>;

    async fn pair_reserves(&self, pair: Address) -> Result<(U256, U256), LedgerError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError>;

    async fn owned_tickets(&self, ticket: Address, owner: Address)
    -> Result<Vec<U256>, LedgerError>;

    async fn tickets_approved_for_all(
        &self,
        ticket: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool, LedgerError>;

    async fn ticket_approved(&self, ticket: Address, ticket_id: U256)
    -> Result<Address, LedgerError>;

    /// Timestamp of the latest block.
    async fn chain_time(&self) -> Result<u64, LedgerError>;

    /// Submits a call and returns its transaction hash without waiting for inclusion.
    async fn submit(&self, call: &LedgerCall) -> Result<H256, LedgerError>;

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Receipt, LedgerError>;
}
