use async_trait::async_trait;
use primitive_types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

use crate::blockchain::gateway::{LedgerGateway, LedgerTransaction};
use crate::blockchain::hex;
use crate::blockchain::transaction::{BlockRef, Transaction};
use crate::config::BlockchainConfig;
use crate::error::{GatewayError, GatewayResult};

const SEND_TRANSACTION_METHOD: &str = "eth_sendTransaction";
const GET_TRANSACTION_BY_HASH_METHOD: &str = "eth_getTransactionByHash";
const GET_BLOCK_BY_NUMBER_METHOD: &str = "eth_getBlockByNumber";
const GET_BALANCE_METHOD: &str = "eth_getBalance";
const BLOCK_NUMBER_METHOD: &str = "eth_blockNumber";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    hash: String,
    block_hash: Option<String>,
    block_number: Option<String>,
    from: String,
    to: Option<String>,
    value: String,
}

impl RawTransaction {
    fn into_ledger_transaction(self) -> GatewayResult<LedgerTransaction> {
        let value = parse_quantity(&self.value)?;
        let block = match (self.block_hash, self.block_number) {
            (Some(hash), Some(number)) if !hash.is_empty() => {
                Some(BlockRef::new(parse_quantity(&number)?, hash))
            }
            _ => None,
        };

        Ok(LedgerTransaction {
            hash: self.hash,
            block,
            from: self.from,
            to: self.to.unwrap_or_default(),
            value,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    hash: Option<String>,
}

fn parse_quantity(value: &str) -> GatewayResult<U256> {
    hex::hex_to_quantity(value)
        .ok_or_else(|| GatewayError::Decode(format!("can't parse `{}` as quantity", value)))
}

/// Ethereum JSON-RPC 2.0 client over HTTP
pub struct EthRpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn new(config: &BlockchainConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            url: config.rpc_url.clone(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(GatewayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        debug!("{} -> {}", method, response.result);
        serde_json::from_value(response.result)
            .map_err(|e| GatewayError::Decode(format!("{}: {}", method, e)))
    }
}

#[async_trait]
impl LedgerGateway for EthRpcClient {
    async fn current_height(&self) -> GatewayResult<U256> {
        let height: String = self.call(BLOCK_NUMBER_METHOD, json!([])).await?;
        parse_quantity(&height)
    }

    async fn balance(&self, address: &str) -> GatewayResult<U256> {
        let balance: String = self
            .call(GET_BALANCE_METHOD, json!([address, "latest"]))
            .await?;
        parse_quantity(&balance)
    }

    #[instrument(skip(self, transaction), fields(from = %transaction.sender(), to = %transaction.recipient()))]
    async fn submit(&self, transaction: &Transaction) -> GatewayResult<String> {
        let params = json!([{
            "from": transaction.sender(),
            "to": transaction.recipient(),
            "value": hex::quantity_to_hex(&transaction.value()),
        }]);
        self.call(SEND_TRANSACTION_METHOD, params).await
    }

    async fn describe(&self, hash: &str) -> GatewayResult<Option<LedgerTransaction>> {
        let raw: Option<RawTransaction> = self
            .call(GET_TRANSACTION_BY_HASH_METHOD, json!([hash]))
            .await?;
        raw.map(RawTransaction::into_ledger_transaction).transpose()
    }

    async fn block_exists(&self, block: &BlockRef) -> GatewayResult<bool> {
        let raw: Option<RawBlock> = self
            .call(
                GET_BLOCK_BY_NUMBER_METHOD,
                json!([hex::quantity_to_hex(&block.number), false]),
            )
            .await?;

        Ok(raw
            .and_then(|b| b.hash)
            .is_some_and(|hash| hash.eq_ignore_ascii_case(&block.hash)))
    }
}
