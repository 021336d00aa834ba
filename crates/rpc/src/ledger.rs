//! `Ledger` implementation over an Ethereum JSON-RPC endpoint.
//!
//! Getter return layouts follow the deployed chef contracts. Struct getters
//! are read by word index, see the `*_WORD` constants.

use std::{sync::LazyLock, time::Duration};

use bytes::Bytes;
use chef_migrator::{
    Ledger, LedgerCall, LedgerError,
    ledger::{
        Address, H256, PrimaryPool, PrimaryPoolKind, Receipt, ReceiptEvent, RegularSlot,
        SecondaryPool, SecondaryPoolKind, SecondaryPosition, U256,
    },
};
use tracing::{debug, warn};

use crate::{
    abi::{AbiError, AbiReader, Token, encode_call, event_topic, word_to_u64},
    client::{RpcClient, RpcLog, RpcReceipt},
};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_RECEIPT_MAX_POLLS: u32 = 90;

// poolInfo(uint256) on the primary chef.
const PRIMARY_POOL_LP_TOKEN_WORD: usize = 0;
const PRIMARY_POOL_ALLOC_POINT_WORD: usize = 1;
const PRIMARY_POOL_TYPE_WORD: usize = 4;
const PRIMARY_POOL_TICKET_WORD: usize = 5;

// pools(uint256) on the secondary chef.
const SECONDARY_POOL_TOKEN_WORD: usize = 0;
const SECONDARY_POOL_ALLOC_POINT_WORD: usize = 1;
const SECONDARY_POOL_TYPE_WORD: usize = 5;
const SECONDARY_POOL_REDEMPTION_PERIOD_WORD: usize = 6;

// userPools(address,uint256) on the secondary chef.
const SECONDARY_POSITION_AMOUNT_WORD: usize = 0;
const SECONDARY_POSITION_REWARD_WORD: usize = 1;

// userRegluars(address,uint256) on the secondary chef.
const REGULAR_SLOT_START_WORD: usize = 0;
const REGULAR_SLOT_END_WORD: usize = 1;
const REGULAR_SLOT_AMOUNT_WORD: usize = 2;

// Both chefs index the user and the pid in their events: topic 1 and topic 2.
const EVENT_PID_TOPIC_INDEX: usize = 2;
const EVENT_AMOUNT_WORD: usize = 0;

static KNOWN_EVENTS: LazyLock<Vec<(H256, &'static str)>> = LazyLock::new(|| {
    [
        ("Withdraw", "Withdraw(address,uint256,uint256)"),
        ("EmergencyWithdraw", "EmergencyWithdraw(address,uint256,uint256)"),
        ("Deposit", "Deposit(address,uint256,uint256)"),
    ]
    .into_iter()
    .map(|(name, signature)| (event_topic(signature), name))
    .collect()
});

#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            max_polls: DEFAULT_RECEIPT_MAX_POLLS,
        }
    }
}

pub struct RpcLedger {
    client: RpcClient,
    /// Account transactions are sent from; the endpoint holds its key.
    from: Address,
    polling: ReceiptPolling,
}

impl RpcLedger {
    pub fn new(client: RpcClient, from: Address, polling: ReceiptPolling) -> Self {
        Self {
            client,
            from,
            polling,
        }
    }

    async fn view(
        &self,
        contract: Address,
        signature: &str,
        args: &[Token],
    ) -> Result<Bytes, LedgerError> {
        let calldata = encode_call(signature, args);
        Ok(self.client.eth_call(contract, &calldata).await?)
    }
}

fn decode_error(signature: &str) -> impl FnOnce(AbiError) -> LedgerError + '_ {
    move |error| LedgerError::Decode(format!("{signature}: {error}"))
}

fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

fn kind_code(value: U256) -> u8 {
    u8::try_from(value.low_u64()).unwrap_or(u8::MAX)
}

/// Calldata for a state-changing call, sent to `LedgerCall::target`.
pub fn encode_ledger_call(call: &LedgerCall) -> Bytes {
    match call {
        LedgerCall::PrimaryWithdraw { pid, amount, .. } => encode_call(
            "withdraw(uint256,uint256)",
            &[uint(*pid), Token::Uint(*amount)],
        ),
        LedgerCall::PrimaryDeposit { pid, amount, .. } => encode_call(
            "deposit(uint256,uint256)",
            &[uint(*pid), Token::Uint(*amount)],
        ),
        LedgerCall::SecondaryWithdraw {
            pid,
            amount,
            regular_ids,
            ..
        } => encode_call(
            "withdraw(uint256,uint256,uint256[],bool,bool)",
            &[
                uint(*pid),
                Token::Uint(*amount),
                Token::UintArray(regular_ids.iter().copied().map(U256::from).collect()),
                // isLp, isWETH
                Token::Bool(false),
                Token::Bool(false),
            ],
        ),
        LedgerCall::SecondaryDeposit { pid, amount, .. } => encode_call(
            "deposit(uint256,uint256,address[],uint256[])",
            &[
                uint(*pid),
                Token::Uint(*amount),
                Token::AddressArray(vec![Address::zero(), Address::zero()]),
                Token::UintArray(vec![U256::zero(), U256::zero()]),
            ],
        ),
        LedgerCall::Approve {
            spender, amount, ..
        } => encode_call(
            "approve(address,uint256)",
            &[Token::Address(*spender), Token::Uint(*amount)],
        ),
        LedgerCall::WithdrawTicket { pid, ticket_id, .. } => encode_call(
            "withdraw_tickets(uint256,uint256)",
            &[uint(*pid), Token::Uint(*ticket_id)],
        ),
        LedgerCall::SetTicketApprovalForAll { operator, .. } => encode_call(
            "setApprovalForAll(address,bool)",
            &[Token::Address(*operator), Token::Bool(true)],
        ),
        LedgerCall::ApproveTicket {
            operator,
            ticket_id,
            ..
        } => encode_call(
            "approve(address,uint256)",
            &[Token::Address(*operator), Token::Uint(*ticket_id)],
        ),
        LedgerCall::DepositAllTickets { ticket, .. } => {
            encode_call("deposit_all_tickets(address)", &[Token::Address(*ticket)])
        }
        LedgerCall::SafeClaim {
            min_reserves,
            pids,
            amounts,
            lp_pid,
            account,
            ..
        } => encode_call(
            "safeClaim(uint256[],uint256[],uint256[],uint256,address)",
            &[
                Token::UintArray(min_reserves.to_vec()),
                Token::UintArray(pids.iter().copied().map(U256::from).collect()),
                Token::UintArray(amounts.clone()),
                uint(*lp_pid),
                Token::Address(*account),
            ],
        ),
    }
}

/// Names the log after the known chef events and extracts pid and amount.
/// Unknown logs decode to an empty event.
pub fn decode_log(log: &RpcLog) -> ReceiptEvent {
    let Some(name) = log.topics.first().and_then(|topic0| {
        KNOWN_EVENTS
            .iter()
            .find(|(topic, _)| topic == topic0)
            .map(|(_, name)| *name)
    }) else {
        return ReceiptEvent::default();
    };

    ReceiptEvent {
        name: Some(name.to_owned()),
        pid: log
            .topics
            .get(EVENT_PID_TOPIC_INDEX)
            .and_then(|topic| word_to_u64(U256::from_big_endian(topic.as_bytes())).ok()),
        amount: AbiReader::new(&log.data).word(EVENT_AMOUNT_WORD).ok(),
    }
}

fn to_receipt(receipt: RpcReceipt) -> Receipt {
    Receipt {
        tx_hash: receipt.transaction_hash,
        status: receipt.status,
        events: receipt.logs.iter().map(decode_log).collect(),
    }
}

#[async_trait::async_trait]
impl Ledger for RpcLedger {
    async fn pool_length(&self, chef: Address) -> Result<u64, LedgerError> {
        let signature = "poolLength()";
        let data = self.view(chef, signature, &[]).await?;
        AbiReader::new(&data).u64(0).map_err(decode_error(signature))
    }

    async fn primary_pool(&self, chef: Address, pid: u64) -> Result<PrimaryPool, LedgerError> {
        let signature = "poolInfo(uint256)";
        let data = self.view(chef, signature, &[uint(pid)]).await?;
        let reader = AbiReader::new(&data);
        let decode = || -> Result<PrimaryPool, AbiError> {
            Ok(PrimaryPool {
                kind: PrimaryPoolKind::from(kind_code(reader.word(PRIMARY_POOL_TYPE_WORD)?)),
                lp_token: reader.address(PRIMARY_POOL_LP_TOKEN_WORD)?,
                ticket: reader.address(PRIMARY_POOL_TICKET_WORD)?,
                alloc_point: reader.word(PRIMARY_POOL_ALLOC_POINT_WORD)?,
            })
        };
        decode().map_err(decode_error(signature))
    }

    async fn primary_staked(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<U256, LedgerError> {
        let signature = "userInfo(uint256,address)";
        let data = self
            .view(chef, signature, &[uint(pid), Token::Address(account)])
            .await?;
        AbiReader::new(&data).word(0).map_err(decode_error(signature))
    }

    async fn staked_tickets(
        &self,
        chef: Address,
        account: Address,
        ticket: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        let signature = "ticket_staked_array(address,address)";
        let data = self
            .view(
                chef,
                signature,
                &[Token::Address(account), Token::Address(ticket)],
            )
            .await?;
        AbiReader::new(&data)
            .uint_array(0)
            .map_err(decode_error(signature))
    }

    async fn secondary_pool(&self, chef: Address, pid: u64) -> Result<SecondaryPool, LedgerError> {
        let signature = "pools(uint256)";
        let data = self.view(chef, signature, &[uint(pid)]).await?;
        let reader = AbiReader::new(&data);
        let decode = || -> Result<SecondaryPool, AbiError> {
            Ok(SecondaryPool {
                kind: SecondaryPoolKind::from(kind_code(reader.word(SECONDARY_POOL_TYPE_WORD)?)),
                token: reader.address(SECONDARY_POOL_TOKEN_WORD)?,
                alloc_point: reader.word(SECONDARY_POOL_ALLOC_POINT_WORD)?,
                redemption_period: reader.word(SECONDARY_POOL_REDEMPTION_PERIOD_WORD)?,
            })
        };
        decode().map_err(decode_error(signature))
    }

    async fn secondary_position(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<SecondaryPosition, LedgerError> {
        let signature = "userPools(address,uint256)";
        let data = self
            .view(chef, signature, &[Token::Address(account), uint(pid)])
            .await?;
        let reader = AbiReader::new(&data);
        let decode = || -> Result<SecondaryPosition, AbiError> {
            Ok(SecondaryPosition {
                deposit: reader.word(SECONDARY_POSITION_AMOUNT_WORD)?,
                reward: reader.word(SECONDARY_POSITION_REWARD_WORD)?,
            })
        };
        decode().map_err(decode_error(signature))
    }

    async fn unlock_time(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<u64, LedgerError> {
        let signature = "userNoFeeTime(address,uint256)";
        let data = self
            .view(chef, signature, &[Token::Address(account), uint(pid)])
            .await?;
        AbiReader::new(&data).u64(0).map_err(decode_error(signature))
    }

    async fn regular_slots(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        let signature = "getUserPoolRegular(address,uint256)";
        let data = self
            .view(chef, signature, &[Token::Address(account), uint(pid)])
            .await?;
        AbiReader::new(&data)
            .uint_array(0)
            .map_err(decode_error(signature))
    }

    async fn regular_slot(
        &self,
        chef: Address,
        account: Address,
        slot: u64,
    ) -> Result<RegularSlot, LedgerError> {
        let signature = "userRegluars(address,uint256)";
        let data = self
            .view(chef, signature, &[Token::Address(account), uint(slot)])
            .await?;
        let reader = AbiReader::new(&data);
        let decode = || -> Result<RegularSlot, AbiError> {
            Ok(RegularSlot {
                redemption_start: reader.u64(REGULAR_SLOT_START_WORD)?,
                redemption_end: reader.u64(REGULAR_SLOT_END_WORD)?,
                amount: reader.word(REGULAR_SLOT_AMOUNT_WORD)?,
            })
        };
        decode().map_err(decode_error(signature))
    }

    async fn pending_reward(
        &self,
        chef: Address,
        pid: u64,
        account: Address,
    ) -> Result<U256, LedgerError> {
        let signature = "pendingV42(uint256,address)";
        let data = self
            .view(chef, signature, &[uint(pid), Token::Address(account)])
            .await?;
        AbiReader::new(&data).word(0).map_err(decode_error(signature))
    }

    async fn claim_pair(&self, chef: Address) -> Result<Address, LedgerError> {
        let signature = "V42_USDT()";
        let data = self.view(chef, signature, &[]).await?;
        AbiReader::new(&data)
            .address(0)
            .map_err(decode_error(signature))
    }

    async fn pair_reserves(&self, pair: Address) -> Result<(U256, U256), LedgerError> {
        let signature = "getReserves()";
        let data = self.view(pair, signature, &[]).await?;
        let reader = AbiReader::new(&data);
        let reserve0 = reader.word(0).map_err(decode_error(signature))?;
        let reserve1 = reader.word(1).map_err(decode_error(signature))?;
        Ok((reserve0, reserve1))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        let signature = "balanceOf(address)";
        let data = self
            .view(token, signature, &[Token::Address(owner)])
            .await?;
        AbiReader::new(&data).word(0).map_err(decode_error(signature))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        let signature = "allowance(address,address)";
        let data = self
            .view(
                token,
                signature,
                &[Token::Address(owner), Token::Address(spender)],
            )
            .await?;
        AbiReader::new(&data).word(0).map_err(decode_error(signature))
    }

    async fn owned_tickets(
        &self,
        ticket: Address,
        owner: Address,
    ) -> Result<Vec<U256>, LedgerError> {
        let signature = "tokensOfOwner(address)";
        let data = self
            .view(ticket, signature, &[Token::Address(owner)])
            .await?;
        AbiReader::new(&data)
            .uint_array(0)
            .map_err(decode_error(signature))
    }

    async fn tickets_approved_for_all(
        &self,
        ticket: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool, LedgerError> {
        let signature = "isApprovedForAll(address,address)";
        let data = self
            .view(
                ticket,
                signature,
                &[Token::Address(owner), Token::Address(operator)],
            )
            .await?;
        AbiReader::new(&data).bool(0).map_err(decode_error(signature))
    }

    async fn ticket_approved(
        &self,
        ticket: Address,
        ticket_id: U256,
    ) -> Result<Address, LedgerError> {
        let signature = "getApproved(uint256)";
        let data = self
            .view(ticket, signature, &[Token::Uint(ticket_id)])
            .await?;
        AbiReader::new(&data)
            .address(0)
            .map_err(decode_error(signature))
    }

    async fn chain_time(&self) -> Result<u64, LedgerError> {
        Ok(self.client.latest_block_timestamp().await?)
    }

    async fn submit(&self, call: &LedgerCall) -> Result<H256, LedgerError> {
        let calldata = encode_ledger_call(call);
        Ok(self
            .client
            .eth_send_transaction(self.from, call.target(), &calldata)
            .await?)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Receipt, LedgerError> {
        for poll in 1..=self.polling.max_polls {
            match self.client.eth_get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(to_receipt(receipt)),
                Ok(None) => {
                    debug!(tx_hash = %format!("{tx_hash:#x}"), poll, "Transaction not yet included");
                }
                Err(error) => {
                    warn!(tx_hash = %format!("{tx_hash:#x}"), poll, %error, "Failed to fetch receipt");
                }
            }
            tokio::time::sleep(self.polling.interval).await;
        }
        Err(LedgerError::ReceiptUnavailable(tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_big_endian()
    }

    #[test]
    fn decodes_withdraw_log() {
        let log = RpcLog {
            address: Address::from_low_u64_be(1),
            topics: vec![
                event_topic("Withdraw(address,uint256,uint256)"),
                H256::from_low_u64_be(0xacc0),
                H256::from_low_u64_be(22),
            ],
            data: Bytes::copy_from_slice(&word(5_000)),
        };

        assert_eq!(
            decode_log(&log),
            ReceiptEvent {
                name: Some("Withdraw".to_owned()),
                pid: Some(22),
                amount: Some(U256::from(5_000u64)),
            }
        );
    }

    #[test]
    fn unknown_logs_decode_to_empty_event() {
        let log = RpcLog {
            address: Address::from_low_u64_be(1),
            topics: vec![event_topic("Transfer(address,address,uint256)")],
            data: Bytes::copy_from_slice(&word(1)),
        };

        assert_eq!(decode_log(&log), ReceiptEvent::default());
    }

    #[test]
    fn known_log_without_data_has_no_amount() {
        let log = RpcLog {
            address: Address::from_low_u64_be(1),
            topics: vec![event_topic("EmergencyWithdraw(address,uint256,uint256)")],
            data: Bytes::new(),
        };

        let event = decode_log(&log);

        assert_eq!(event.name.as_deref(), Some("EmergencyWithdraw"));
        assert_eq!(event.pid, None);
        assert_eq!(event.amount, None);
    }

    #[test]
    fn secondary_deposit_passes_empty_zap_arguments() {
        let calldata = encode_ledger_call(&LedgerCall::SecondaryDeposit {
            chef: Address::from_low_u64_be(2),
            pid: 54,
            amount: U256::from(9u64),
        });
        let reader = AbiReader::new(calldata.get(4..).unwrap_or_default());

        assert_eq!(reader.u64(0), Ok(54));
        assert_eq!(reader.word(1), Ok(U256::from(9u64)));
        assert_eq!(reader.uint_array(3), Ok(vec![U256::zero(), U256::zero()]));
    }

    #[test]
    fn safe_claim_encodes_batch_in_order() {
        let account = Address::from_low_u64_be(0xacc0);
        let calldata = encode_ledger_call(&LedgerCall::SafeClaim {
            chef: Address::from_low_u64_be(2),
            min_reserves: [1u64, 2, 3, 4].map(U256::from),
            pids: vec![0, 22],
            amounts: vec![U256::from(15u64), U256::from(2u64)],
            lp_pid: 22,
            account,
        });
        let reader = AbiReader::new(calldata.get(4..).unwrap_or_default());

        assert_eq!(reader.uint_array(0), Ok([1u64, 2, 3, 4].map(U256::from).to_vec()));
        assert_eq!(
            reader.uint_array(1),
            Ok(vec![U256::zero(), U256::from(22u64)])
        );
        assert_eq!(
            reader.uint_array(2),
            Ok(vec![U256::from(15u64), U256::from(2u64)])
        );
        assert_eq!(reader.u64(3), Ok(22));
        assert_eq!(reader.address(4), Ok(account));
    }
}
