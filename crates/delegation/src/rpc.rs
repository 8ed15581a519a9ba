//! RpcClient: live chain backend speaking Ethereum JSON-RPC over HTTP.
//!
//! Serves reads with `eth_call`, fee inputs from the latest block and the
//! node's fee suggestions, and writes as locally signed EIP-1559
//! transactions. Requires the `eth-rpc` feature.

#[cfg(feature = "eth-rpc")]
mod eth_rpc {
    use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
    use alloy::eips::eip2718::Encodable2718;
    use alloy::primitives::{Address, Bytes, TxKind, B256};
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;
    use bulk_revoke_core::{
        BoxFuture, ChainReader, ChainWriter, Error, FeeBid, FeeInputs, FeeOracle, Result,
        TxReceipt,
    };
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::str::FromStr;
    use std::time::Duration;
    use tokio::sync::{Mutex, OnceCell};
    use tracing::{debug, warn};

    const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// Headroom added on top of `eth_estimateGas`, in percent.
    const GAS_LIMIT_MARGIN_PERCENT: u64 = 20;

    pub struct RpcClient {
        http_url: String,
        client: reqwest::Client,
        signer: Option<PrivateKeySigner>,
        chain_id: OnceCell<u64>,
        /// Held from the nonce read until the node has the signed
        /// transaction, so concurrent sends never share a nonce.
        send_lock: Mutex<()>,
        receipt_timeout: Duration,
        poll_interval: Duration,
    }

    impl RpcClient {
        pub fn new(http_url: impl Into<String>) -> Self {
            Self {
                http_url: http_url.into(),
                client: reqwest::Client::new(),
                signer: None,
                chain_id: OnceCell::new(),
                send_lock: Mutex::new(()),
                receipt_timeout: Duration::from_secs(180),
                poll_interval: RECEIPT_POLL_INTERVAL,
            }
        }

        /// Sign outgoing transactions with `private_key` (hex, optional `0x`).
        pub fn with_signer(mut self, private_key: &str) -> crate::error::Result<Self> {
            let signer = PrivateKeySigner::from_str(private_key.trim()).map_err(|e| {
                crate::error::Error::Signer(format!("invalid private key: {e}"))
            })?;
            self.signer = Some(signer);
            Ok(self)
        }

        pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
            self.receipt_timeout = timeout;
            self
        }

        pub fn signer_address(&self) -> Option<Address> {
            self.signer.as_ref().map(|s| s.address())
        }

        async fn request(&self, method: &str, params: Value) -> Result<Value> {
            json_rpc(&self.client, &self.http_url, method, params).await
        }

        async fn chain_id(&self) -> Result<u64> {
            self.chain_id
                .get_or_try_init(|| async {
                    let id = parse_quantity(&self.request("eth_chainId", json!([])).await?)?;
                    u64::try_from(id).map_err(|_| Error::Rpc(format!("chain id {id} out of range")))
                })
                .await
                .copied()
        }

        async fn block_base_fee(&self) -> Result<Option<u128>> {
            let block = self
                .request("eth_getBlockByNumber", json!(["latest", false]))
                .await?;
            match block.get("baseFeePerGas") {
                None | Some(Value::Null) => Ok(None),
                Some(fee) => parse_quantity(fee).map(Some),
            }
        }

        async fn sign_and_send(&self, to: Address, input: Bytes, fees: FeeBid) -> Result<B256> {
            let signer = self
                .signer
                .as_ref()
                .ok_or_else(|| Error::Rpc("no signing key configured".into()))?;
            let from = signer.address();
            let data = format!("0x{}", hex::encode(&input));

            let chain_id = self.chain_id().await?;
            let nonce = parse_quantity(
                &self
                    .request("eth_getTransactionCount", json!([from.to_string(), "pending"]))
                    .await?,
            )?;
            let estimate = parse_quantity(
                &self
                    .request(
                        "eth_estimateGas",
                        json!([{ "from": from.to_string(), "to": to.to_string(), "data": data }]),
                    )
                    .await?,
            )?;
            let estimate = u64::try_from(estimate)
                .map_err(|_| Error::Rpc(format!("gas estimate {estimate} out of range")))?;

            let tx = TxEip1559 {
                chain_id,
                nonce: u64::try_from(nonce)
                    .map_err(|_| Error::Rpc(format!("nonce {nonce} out of range")))?,
                gas_limit: estimate.saturating_mul(100 + GAS_LIMIT_MARGIN_PERCENT) / 100,
                max_fee_per_gas: fees.max_fee_per_gas,
                max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                to: TxKind::Call(to),
                input,
                ..Default::default()
            };
            let signature = signer
                .sign_hash_sync(&tx.signature_hash())
                .map_err(|e| Error::Rpc(format!("signing failed: {e}")))?;
            debug!(nonce = tx.nonce, gas_limit = tx.gas_limit, "sending raw transaction");
            let raw = TxEnvelope::from(tx.into_signed(signature)).encoded_2718();

            let hash = self
                .request(
                    "eth_sendRawTransaction",
                    json!([format!("0x{}", hex::encode(raw))]),
                )
                .await?;
            parse_b256(&hash)
        }

        /// Poll until the receipt shows up. Transport and node errors are
        /// retried on the next tick; only an unreadable receipt ends the wait.
        async fn poll_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
            loop {
                match self
                    .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                    .await
                {
                    Ok(Value::Null) => {}
                    Ok(receipt) => {
                        let raw: RawReceipt = serde_json::from_value(receipt)
                            .map_err(|e| Error::Rpc(format!("malformed receipt: {e}")))?;
                        return raw.into_receipt();
                    }
                    Err(e) => warn!(tx = %tx_hash, error = %e, "receipt poll failed, retrying"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    #[derive(Deserialize)]
    struct RpcResponse {
        result: Option<Value>,
        error: Option<RpcError>,
    }

    #[derive(Deserialize)]
    struct RpcError {
        code: i64,
        message: String,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawReceipt {
        transaction_hash: String,
        block_number: String,
        /// Absent on pre-Byzantium receipts.
        status: Option<String>,
    }

    impl RawReceipt {
        fn into_receipt(self) -> Result<TxReceipt> {
            let block_number = parse_quantity(&Value::String(self.block_number))?;
            let success = match self.status.as_deref() {
                Some(status) => parse_quantity(&Value::String(status.to_string()))? == 1,
                None => true,
            };
            Ok(TxReceipt {
                tx_hash: parse_b256(&Value::String(self.transaction_hash))?,
                block_number: u64::try_from(block_number)
                    .map_err(|_| Error::Rpc(format!("block {block_number} out of range")))?,
                success,
            })
        }
    }

    /// Send a JSON-RPC request and return the "result" field.
    async fn json_rpc(
        client: &reqwest::Client,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let resp = client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Rpc(format!("{method} request failed: {e}")))?;

        let resp: RpcResponse = resp
            .json()
            .await
            .map_err(|e| Error::Rpc(format!("{method} response parse failed: {e}")))?;

        if let Some(err) = resp.error {
            return Err(Error::Rpc(format!(
                "{method} error {}: {}",
                err.code, err.message
            )));
        }
        // A null result is meaningful for receipt lookups.
        Ok(resp.result.unwrap_or(Value::Null))
    }

    fn parse_quantity(value: &Value) -> Result<u128> {
        let s = value
            .as_str()
            .ok_or_else(|| Error::Rpc(format!("expected hex quantity, got {value}")))?;
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() {
            return Ok(0);
        }
        u128::from_str_radix(digits, 16).map_err(|e| Error::Rpc(format!("bad quantity {s}: {e}")))
    }

    fn parse_bytes(value: &Value) -> Result<Bytes> {
        let s = value
            .as_str()
            .ok_or_else(|| Error::Rpc(format!("expected hex data, got {value}")))?;
        hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map(Bytes::from)
            .map_err(|e| Error::Rpc(format!("bad data: {e}")))
    }

    fn parse_b256(value: &Value) -> Result<B256> {
        let s = value
            .as_str()
            .ok_or_else(|| Error::Rpc(format!("expected hash, got {value}")))?;
        B256::from_str(s).map_err(|e| Error::Rpc(format!("bad hash {s}: {e}")))
    }

    impl ChainReader for RpcClient {
        fn call(&self, to: Address, input: Bytes) -> BoxFuture<'_, Result<Bytes>> {
            Box::pin(async move {
                let params = json!([{
                    "to": to.to_string(),
                    "data": format!("0x{}", hex::encode(&input)),
                }, "latest"]);
                parse_bytes(&self.request("eth_call", params).await?)
            })
        }
    }

    impl FeeOracle for RpcClient {
        fn fee_inputs(&self) -> BoxFuture<'_, Result<FeeInputs>> {
            Box::pin(async move {
                let (base_fee, priority, gas_price) = tokio::join!(
                    self.block_base_fee(),
                    self.request("eth_maxPriorityFeePerGas", json!([])),
                    self.request("eth_gasPrice", json!([])),
                );
                let base_fee = base_fee?;
                let legacy_gas_price = parse_quantity(&gas_price?)?;
                // Nodes without the priority fee method: whatever the gas
                // price carries above the base fee.
                let suggested_priority_fee = match priority.and_then(|v| parse_quantity(&v)) {
                    Ok(tip) => tip,
                    Err(e) => {
                        debug!(error = %e, "no priority fee suggestion");
                        legacy_gas_price.saturating_sub(base_fee.unwrap_or(0))
                    }
                };
                Ok(FeeInputs {
                    base_fee,
                    suggested_priority_fee,
                    legacy_gas_price,
                })
            })
        }
    }

    impl ChainWriter for RpcClient {
        fn send(&self, to: Address, input: Bytes, fees: FeeBid) -> BoxFuture<'_, Result<B256>> {
            Box::pin(async move {
                let _serialized = self.send_lock.lock().await;
                self.sign_and_send(to, input, fees)
                    .await
                    .map_err(|e| Error::Dispatch(e.to_string()))
            })
        }

        fn await_receipt(&self, tx_hash: B256) -> BoxFuture<'_, Result<TxReceipt>> {
            Box::pin(async move {
                match tokio::time::timeout(self.receipt_timeout, self.poll_receipt(tx_hash)).await
                {
                    Ok(receipt) => receipt.map_err(|e| Error::Confirmation(e.to_string())),
                    Err(_) => Err(Error::Confirmation(format!(
                        "no receipt for {tx_hash} after {:?}",
                        self.receipt_timeout
                    ))),
                }
            })
        }
    }

}

#[cfg(feature = "eth-rpc")]
pub use eth_rpc::RpcClient;
