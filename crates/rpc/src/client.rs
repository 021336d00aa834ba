//! Thin async JSON-RPC HTTP client for the handful of `eth_*` methods the
//! migrator needs.

use std::time::Duration;

use bytes::Bytes;
use chef_migrator::LedgerError;
use ethereum_types::{Address, H256};
use serde_json::{Value, json};
use url::Url;

#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Per-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{method}: request to {url} failed: {cause}")]
    ConnectionFailed {
        method: String,
        url: String,
        cause: String,
    },
    #[error("{method}: timed out")]
    Timeout { method: String },
    #[error("{method}: HTTP {status}: {body}")]
    HttpError {
        method: String,
        status: u16,
        body: String,
    },
    #[error("{method}: JSON-RPC error {code}: {message}")]
    JsonRpcError {
        method: String,
        code: i64,
        message: String,
    },
    #[error("{method}: could not parse {field}: {cause}")]
    ParseError {
        method: String,
        field: String,
        cause: String,
    },
}

impl RpcError {
    fn parse(method: &str, field: &str, cause: impl Into<String>) -> Self {
        Self::ParseError {
            method: method.into(),
            field: field.into(),
            cause: cause.into(),
        }
    }
}

impl From<RpcError> for LedgerError {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::JsonRpcError { .. } => Self::Rpc(error.to_string()),
            RpcError::ParseError { .. } => Self::Decode(error.to_string()),
            RpcError::ConnectionFailed { .. }
            | RpcError::Timeout { .. }
            | RpcError::HttpError { .. } => Self::Transport(error.to_string()),
        }
    }
}

/// Log entry of a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Subset of receipt fields returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    pub status: bool,
    pub logs: Vec<RpcLog>,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url) -> Self {
        Self::with_config(url, RpcConfig::default())
    }

    pub fn with_config(url: Url, config: RpcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http, url }
    }

    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Bytes, RpcError> {
        let result = self
            .call(
                "eth_call",
                json!([
                    { "to": format!("{to:#x}"), "data": format!("0x{}", hex::encode(data)) },
                    "latest"
                ]),
            )
            .await?;
        parse_bytes("eth_call", "result", &result)
    }

    /// Submits an unsigned transaction; the endpoint signs it for `from`.
    pub async fn eth_send_transaction(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<H256, RpcError> {
        let result = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": format!("{from:#x}"),
                    "to": format!("{to:#x}"),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await?;
        parse_h256("eth_sendTransaction", "result", &result)
    }

    /// `None` while the transaction is still pending.
    pub async fn eth_get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcReceipt>, RpcError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([format!("{tx_hash:#x}")]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result).map(Some)
    }

    pub async fn latest_block_timestamp(&self) -> Result<u64, RpcError> {
        let method = "eth_getBlockByNumber";
        let block = self.call(method, json!(["latest", false])).await?;
        let timestamp = block
            .get("timestamp")
            .ok_or_else(|| RpcError::parse(method, "timestamp", "missing"))?;
        parse_u64(method, "timestamp", timestamp)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        method: method.into(),
                    }
                } else {
                    RpcError::ConnectionFailed {
                        method: method.into(),
                        url: self.url.to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpError {
                method: method.into(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let json_response: Value = response
            .json()
            .await
            .map_err(|e| RpcError::parse(method, "response_body", e.to_string()))?;

        if let Some(error) = json_response.get("error") {
            return Err(RpcError::JsonRpcError {
                method: method.into(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        json_response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::parse(method, "result", "missing result field"))
    }
}

// --- Parsing helpers ---

fn as_hex_str<'a>(method: &str, field: &str, value: &'a Value) -> Result<&'a str, RpcError> {
    let raw = value
        .as_str()
        .ok_or_else(|| RpcError::parse(method, field, "expected hex string"))?;
    Ok(raw.strip_prefix("0x").unwrap_or(raw))
}

fn parse_bytes(method: &str, field: &str, value: &Value) -> Result<Bytes, RpcError> {
    let raw = as_hex_str(method, field, value)?;
    hex::decode(raw)
        .map(Bytes::from)
        .map_err(|e| RpcError::parse(method, field, e.to_string()))
}

fn parse_u64(method: &str, field: &str, value: &Value) -> Result<u64, RpcError> {
    let raw = as_hex_str(method, field, value)?;
    u64::from_str_radix(raw, 16).map_err(|e| RpcError::parse(method, field, e.to_string()))
}

fn parse_h256(method: &str, field: &str, value: &Value) -> Result<H256, RpcError> {
    let bytes = parse_bytes(method, field, value)?;
    if bytes.len() != 32 {
        return Err(RpcError::parse(
            method,
            field,
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(H256::from_slice(&bytes))
}

fn parse_address(method: &str, field: &str, value: &Value) -> Result<Address, RpcError> {
    let bytes = parse_bytes(method, field, value)?;
    if bytes.len() != 20 {
        return Err(RpcError::parse(
            method,
            field,
            format!("expected 20 bytes, got {}", bytes.len()),
        ));
    }
    Ok(Address::from_slice(&bytes))
}

fn parse_receipt(value: &Value) -> Result<RpcReceipt, RpcError> {
    let method = "eth_getTransactionReceipt";
    let field = |name: &str| {
        value
            .get(name)
            .ok_or_else(|| RpcError::parse(method, name, "missing"))
    };

    let status = parse_u64(method, "status", field("status")?)?;
    let logs = field("logs")?
        .as_array()
        .ok_or_else(|| RpcError::parse(method, "logs", "expected array"))?
        .iter()
        .map(parse_log)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RpcReceipt {
        transaction_hash: parse_h256(method, "transactionHash", field("transactionHash")?)?,
        status: status == 1,
        logs,
    })
}

fn parse_log(value: &Value) -> Result<RpcLog, RpcError> {
    let method = "eth_getTransactionReceipt";
    let topics = value
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::parse(method, "topics", "expected array"))?
        .iter()
        .map(|topic| parse_h256(method, "topics", topic))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RpcLog {
        address: parse_address(
            method,
            "address",
            value
                .get("address")
                .ok_or_else(|| RpcError::parse(method, "address", "missing"))?,
        )?,
        topics,
        data: value
            .get("data")
            .map(|data| parse_bytes(method, "data", data))
            .transpose()?
            .unwrap_or_default(),
    })
}
