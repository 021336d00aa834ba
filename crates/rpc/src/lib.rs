pub mod abi;
pub mod client;
pub mod ledger;

pub use client::{RpcClient, RpcConfig, RpcError};
pub use ledger::{ReceiptPolling, RpcLedger};
