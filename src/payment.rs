//! Optional payment step run after a receipt has been signed.

use std::time::Duration;

use alloy_primitives::U256;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{Address, Error, Identity, TRANSFER_GAS_LIMIT, Transfer};

/// Submits a transfer on behalf of the signer.
///
/// Returns the transaction id, or `None` when no payment was made.
pub trait PaymentCollaborator: Send + Sync {
    fn pay(
        &self,
        identity: &Identity,
        destination: &Address,
        amount_wei: u128,
    ) -> Result<Option<String>, Error>;
}

/// Never pays.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPayment;

impl PaymentCollaborator for NoPayment {
    fn pay(&self, _: &Identity, _: &Address, _: u128) -> Result<Option<String>, Error> {
        Ok(None)
    }
}

/// Pays through a JSON-RPC node with a signed legacy transfer.
pub struct RpcPayment {
    url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, Error> {
        if let Some(err) = self.error {
            return Err(Error::Payment(format!(
                "{} returned {}: {}",
                method, err.code, err.message
            )));
        }
        self.result
            .ok_or_else(|| Error::Payment(format!("{} returned no result", method)))
    }
}

impl RpcPayment {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T, Error> {
        debug!(method, url = %self.url, "json-rpc call");

        let response: RpcResponse<T> = self
            .agent
            .post(&self.url)
            .send_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .map_err(|e| Error::Payment(format!("{}: {}", method, e)))?
            .into_json()
            .map_err(|e| Error::Payment(format!("{}: {}", method, e)))?;

        response.into_result(method)
    }

    fn quantity(&self, method: &str, params: serde_json::Value) -> Result<u128, Error> {
        let value: String = self.call(method, params)?;
        parse_quantity(&value)
    }
}

impl PaymentCollaborator for RpcPayment {
    fn pay(
        &self,
        identity: &Identity,
        destination: &Address,
        amount_wei: u128,
    ) -> Result<Option<String>, Error> {
        let from = identity.address().to_string();

        let chain_id = self.quantity("eth_chainId", json!([]))?;
        let nonce = self.quantity("eth_getTransactionCount", json!([from, "pending"]))?;
        let gas_price = self.quantity("eth_gasPrice", json!([]))?;

        let transfer = Transfer {
            nonce: u64::try_from(nonce).map_err(|e| Error::Payment(e.to_string()))?,
            gas_price,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: *destination,
            value: U256::from(amount_wei),
            chain_id: u64::try_from(chain_id).map_err(|e| Error::Payment(e.to_string()))?,
        };
        let signed = transfer.sign(identity);

        info!(
            to = %destination,
            amount_wei,
            nonce = transfer.nonce,
            "submitting payment"
        );
        let tx_hash: String = self.call("eth_sendRawTransaction", json!([signed.raw_hex()]))?;
        if !tx_hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            warn!(
                %tx_hash,
                expected = %signed.hash_hex(),
                "node reported a different transaction hash"
            );
        }
        info!(%tx_hash, "payment submitted");

        Ok(Some(tx_hash))
    }
}

/// Parses a `0x`-prefixed hex quantity as returned by JSON-RPC nodes.
pub(crate) fn parse_quantity(value: &str) -> Result<u128, Error> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| Error::Payment(format!("quantity {:?} lacks 0x prefix", value)))?;

    if digits.is_empty() {
        return Ok(0);
    }

    u128::from_str_radix(digits, 16)
        .map_err(|e| Error::Payment(format!("quantity {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::{TcpListener, TcpStream},
        sync::mpsc,
        thread,
    };

    use serde_json::Value;

    use super::*;
    use crate::parse_address;

    const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TREASURY: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f5bD21";

    /// Answers JSON-RPC calls over HTTP until a raw transaction arrives,
    /// then returns every request it saw in order.
    fn fake_node(listener: TcpListener, tx_hash: String) -> thread::JoinHandle<Vec<Value>> {
        let (requests, seen) = mpsc::channel::<Value>();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = stream.unwrap();
                let requests = requests.clone();
                let tx_hash = tx_hash.clone();
                thread::spawn(move || serve_connection(stream, &tx_hash, &requests));
            }
        });

        thread::spawn(move || {
            let mut all = Vec::new();
            for request in seen {
                let done = request["method"] == "eth_sendRawTransaction";
                all.push(request);
                if done {
                    break;
                }
            }
            all
        })
    }

    fn serve_connection(mut stream: TcpStream, tx_hash: &str, requests: &mpsc::Sender<Value>) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                return;
            }

            let mut content_length = 0;
            loop {
                line.clear();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let request: Value = serde_json::from_slice(&body).unwrap();

            let result = match request["method"].as_str().unwrap() {
                "eth_chainId" => "0x1",
                "eth_getTransactionCount" => "0x9",
                "eth_gasPrice" => "0x4a817c800",
                _ => tx_hash,
            };
            let response = json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string();
            let _ = requests.send(request);

            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                response.len(),
                response
            )
            .unwrap();
        }
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x4a817c800").unwrap(), 20_000_000_000);
        assert!(parse_quantity("1234").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_rpc_error_object() {
        let response: RpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"insufficient funds"}}"#,
        )
        .unwrap();

        let err = response.into_result("eth_sendRawTransaction").unwrap_err();
        assert!(matches!(err, Error::Payment(ref m) if m.contains("insufficient funds")));
    }

    #[test]
    fn test_rpc_result() {
        let response: RpcResponse<String> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#).unwrap();

        assert_eq!(response.into_result("eth_chainId").unwrap(), "0x1");
    }

    #[test]
    fn test_no_payment() {
        let identity = Identity::from_private_key_hex(KEY_0).unwrap();
        let treasury = parse_address(TREASURY).unwrap();

        assert_eq!(NoPayment.pay(&identity, &treasury, 1).unwrap(), None);
    }

    #[test]
    fn test_unreachable_node() {
        let identity = Identity::from_private_key_hex(KEY_0).unwrap();
        let treasury = parse_address(TREASURY).unwrap();
        let payment = RpcPayment::new("http://127.0.0.1:1", Duration::from_secs(2));

        let err = payment.pay(&identity, &treasury, 1).unwrap_err();
        assert!(matches!(err, Error::Payment(_)));
    }

    #[test]
    fn test_payment_through_node() {
        let identity = Identity::from_private_key_hex(KEY_0).unwrap();
        let treasury = parse_address(TREASURY).unwrap();

        let expected = Transfer {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: treasury,
            value: U256::from(100_000_000_000_000u128),
            chain_id: 1,
        }
        .sign(&identity);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let node = fake_node(listener, expected.hash_hex());

        let payment = RpcPayment::new(url, Duration::from_secs(5));
        let tx_hash = payment
            .pay(&identity, &treasury, 100_000_000_000_000)
            .unwrap();
        assert_eq!(tx_hash, Some(expected.hash_hex()));

        let requests = node.join().unwrap();
        let methods: Vec<_> = requests
            .iter()
            .map(|r| r["method"].as_str().unwrap())
            .collect();
        assert_eq!(
            methods,
            [
                "eth_chainId",
                "eth_getTransactionCount",
                "eth_gasPrice",
                "eth_sendRawTransaction"
            ]
        );
        assert_eq!(
            requests[1]["params"][0].as_str().unwrap(),
            identity.address().to_string()
        );
        assert_eq!(
            requests[3]["params"][0].as_str().unwrap(),
            expected.raw_hex()
        );
    }
}
