//! Node RPC client.
//!
//! [`ChainClient`] is what [`crate::sync::ChainSync`] and the wallet engine
//! need from a node. [`HttpRpcClient`] speaks the node's JSON-RPC dialect:
//! a `{"method", "params"}` body where every parameter is a string, answered
//! by `{id, jsonrpc, error, result}`.

use std::collections::BTreeMap;
use std::time::Duration;

use ela_core::amount::parse_amount;
use ela_core::error::SerializationError;
use ela_core::{Hash256, OutPoint, TxType};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::WalletError;

/// An output as reported by the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainOutput {
    /// Destination address string.
    pub address: String,
    /// Value in sela.
    pub value: u64,
    /// Output lock height; 0 for none.
    pub lock: u32,
}

/// A transaction as reported by the node. Only what sync needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainTransaction {
    pub txid: Hash256,
    pub is_coinbase: bool,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<ChainOutput>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainBlock {
    pub height: u32,
    pub transactions: Vec<ChainTransaction>,
}

/// Remote chain access.
pub trait ChainClient: Send + Sync {
    /// Height of the node's best block.
    fn chain_height(&self) -> Result<u32, WalletError>;

    fn block_by_height(&self, height: u32) -> Result<ChainBlock, WalletError>;

    /// Submit a signed transaction; returns the node's answer (the txid).
    fn broadcast_raw_transaction(&self, raw_hex: &str) -> Result<String, WalletError>;
}

// ── Wire schema ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: BTreeMap<&'a str, String>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBlock {
    block_data: RawBlockData,
    // Go encodes an empty slice as null.
    transactions: Option<Vec<RawTransaction>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBlockData {
    height: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTransaction {
    hash: String,
    tx_type: u8,
    #[serde(rename = "UTXOInputs")]
    utxo_inputs: Option<Vec<RawInput>>,
    outputs: Option<Vec<RawOutput>>,
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(rename = "ReferTxID")]
    refer_tx_id: String,
    #[serde(rename = "ReferTxOutputIndex")]
    refer_tx_output_index: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawOutput {
    value: String,
    address: String,
    #[serde(default)]
    output_lock: u32,
}

impl RawBlock {
    fn validate(self) -> Result<ChainBlock, SerializationError> {
        let transactions = self
            .transactions
            .unwrap_or_default()
            .into_iter()
            .map(RawTransaction::validate)
            .collect::<Result<_, _>>()?;
        Ok(ChainBlock {
            height: self.block_data.height,
            transactions,
        })
    }
}

impl RawTransaction {
    fn validate(self) -> Result<ChainTransaction, SerializationError> {
        let inputs = self
            .utxo_inputs
            .unwrap_or_default()
            .into_iter()
            .map(|i| Ok(OutPoint::new(Hash256::from_reversed_hex(&i.refer_tx_id)?, i.refer_tx_output_index)))
            .collect::<Result<_, SerializationError>>()?;
        let outputs = self
            .outputs
            .unwrap_or_default()
            .into_iter()
            .map(|o| {
                Ok(ChainOutput {
                    value: parse_amount(&o.value)?,
                    address: o.address,
                    lock: o.output_lock,
                })
            })
            .collect::<Result<_, SerializationError>>()?;
        Ok(ChainTransaction {
            txid: Hash256::from_reversed_hex(&self.hash)?,
            is_coinbase: self.tx_type == TxType::CoinBase as u8,
            inputs,
            outputs,
        })
    }
}

/// Decode a `getblockbyheight` result into a [`ChainBlock`].
pub fn parse_block(result: Value) -> Result<ChainBlock, WalletError> {
    let raw: RawBlock = from_value(result)?;
    Ok(raw.validate()?)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, WalletError> {
    serde_json::from_value(value).map_err(|e| SerializationError::InvalidFormat(e.to_string()).into())
}

// ── HTTP client ──────────────────────────────────────────────────────────────

/// Blocking JSON-RPC client for an ELA node.
pub struct HttpRpcClient {
    client: Client,
    endpoint: String,
}

impl HttpRpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one call and return the raw `result` value.
    pub fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, WalletError> {
        let body = RpcRequest {
            method,
            params: params.iter().cloned().collect(),
        };
        debug!(method, endpoint = %self.endpoint, "rpc call");

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| WalletError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().map_err(|e| WalletError::Network(e.to_string()))?;
        if !status.is_success() {
            // Some nodes pair an error object with a non-2xx status.
            return Err(match serde_json::from_str::<RpcResponse>(&text) {
                Ok(RpcResponse { error: Some(err), .. }) => WalletError::Rpc {
                    code: err.code,
                    message: err.message,
                },
                _ => WalletError::Network(format!("http status {status}")),
            });
        }
        let resp: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| SerializationError::InvalidFormat(format!("rpc response: {e}")))?;

        if let Some(err) = resp.error {
            return Err(WalletError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(resp.result)
    }
}

impl ChainClient for HttpRpcClient {
    fn chain_height(&self) -> Result<u32, WalletError> {
        from_value(self.call("getcurrentheight", &[])?)
    }

    fn block_by_height(&self, height: u32) -> Result<ChainBlock, WalletError> {
        parse_block(self.call("getblockbyheight", &[("height", height.to_string())])?)
    }

    fn broadcast_raw_transaction(&self, raw_hex: &str) -> Result<String, WalletError> {
        from_value(self.call("sendrawtransaction", &[("data", raw_hex.to_owned())])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TXID: &str = "a3c1a1c9e3ff6c2a4f0e4d2c9bb1f6ad4f4c0c1b0e5d2a1f9e8d7c6b5a493827";

    fn block_json() -> Value {
        json!({
            "Hash": "00",
            "BlockData": { "Height": 100, "Version": 0 },
            "Transactions": [
                {
                    "TxType": 0,
                    "Hash": TXID,
                    "UTXOInputs": null,
                    "Outputs": [
                        { "AssetID": "x", "Value": "1.5", "Address": "Eaddr", "OutputLock": 0 }
                    ],
                    "LockTime": 0
                },
                {
                    "TxType": 2,
                    "Hash": TXID,
                    "UTXOInputs": [
                        { "ReferTxID": TXID, "ReferTxOutputIndex": 3, "Sequence": 0 }
                    ],
                    "Outputs": null
                }
            ]
        })
    }

    #[test]
    fn parses_node_block() {
        let block = parse_block(block_json()).unwrap();
        assert_eq!(block.height, 100);
        assert_eq!(block.transactions.len(), 2);

        let coinbase = &block.transactions[0];
        assert!(coinbase.is_coinbase);
        assert!(coinbase.inputs.is_empty());
        assert_eq!(coinbase.txid.to_reversed_hex(), TXID);
        assert_eq!(
            coinbase.outputs,
            vec![ChainOutput { address: "Eaddr".into(), value: 150_000_000, lock: 0 }]
        );

        let transfer = &block.transactions[1];
        assert!(!transfer.is_coinbase);
        assert_eq!(transfer.inputs, vec![OutPoint::new(Hash256::from_reversed_hex(TXID).unwrap(), 3)]);
        assert!(transfer.outputs.is_empty());
    }

    #[test]
    fn empty_block_tolerates_null_transactions() {
        let block = parse_block(json!({ "BlockData": { "Height": 7 }, "Transactions": null })).unwrap();
        assert_eq!(block, ChainBlock { height: 7, transactions: vec![] });
    }

    #[test]
    fn shape_errors_are_serialization_errors() {
        let missing = parse_block(json!({ "Transactions": [] }));
        assert!(matches!(missing, Err(WalletError::Serialization(SerializationError::InvalidFormat(_)))));

        let mut bad_amount = block_json();
        bad_amount["Transactions"][0]["Outputs"][0]["Value"] = json!("one");
        assert!(matches!(
            parse_block(bad_amount),
            Err(WalletError::Serialization(SerializationError::InvalidAmount(_)))
        ));

        let mut bad_hash = block_json();
        bad_hash["Transactions"][1]["Hash"] = json!("zz");
        assert!(matches!(parse_block(bad_hash), Err(WalletError::Serialization(_))));
    }

    #[test]
    fn request_params_are_strings() {
        let body = RpcRequest {
            method: "getblockbyheight",
            params: [("height", 42.to_string())].into_iter().collect(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "method": "getblockbyheight", "params": { "height": "42" } })
        );
    }

    #[test]
    fn response_error_object_decoded() {
        let resp: RpcResponse =
            serde_json::from_str(r#"{"id":0,"jsonrpc":"2.0","error":{"code":-32602,"message":"bad"},"result":null}"#)
                .unwrap();
        let err = resp.error.unwrap();
        assert_eq!((err.code, err.message.as_str()), (-32602, "bad"));

        let ok: RpcResponse = serde_json::from_str(r#"{"id":0,"jsonrpc":"2.0","error":null,"result":12}"#).unwrap();
        assert!(ok.error.is_none());
        assert_eq!(ok.result, json!(12));
    }

    /// Answer one HTTP request with a canned reply; returns the endpoint URL.
    fn serve_once(status_line: &'static str, content_type: &'static str, body: &'static str) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if n == 0 || request.len() >= end + 4 + length {
                        break;
                    }
                } else if n == 0 {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: &str) -> HttpRpcClient {
        HttpRpcClient::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_failure_with_html_body_is_network_error() {
        let endpoint = serve_once("502 Bad Gateway", "text/html", "<html><body>bad gateway</body></html>");
        match client(&endpoint).chain_height() {
            Err(WalletError::Network(msg)) => assert!(msg.contains("502"), "{msg}"),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[test]
    fn http_failure_with_error_object_is_rpc_error() {
        let endpoint = serve_once(
            "500 Internal Server Error",
            "application/json",
            r#"{"error":{"code":-32601,"message":"method not found"},"result":null}"#,
        );
        assert_eq!(
            client(&endpoint).chain_height(),
            Err(WalletError::Rpc {
                code: -32601,
                message: "method not found".into(),
            })
        );
    }

    #[test]
    fn successful_reply_with_garbage_is_serialization_error() {
        let endpoint = serve_once("200 OK", "text/plain", "not json");
        assert!(matches!(
            client(&endpoint).chain_height(),
            Err(WalletError::Serialization(SerializationError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn unreachable_node_is_network_error() {
        let client = HttpRpcClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        assert!(matches!(client.chain_height(), Err(WalletError::Network(_))));
    }
}
