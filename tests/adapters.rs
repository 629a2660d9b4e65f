//! Chain adapters against mocked provider APIs.

use alloy::primitives::U256;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use donation_indexer::adapter::{build_adapter, AdapterOptions, ChainAdapter, TxLookup, UtxoDialect};
use donation_indexer::chain::{ChainProfile, ChainSlug};
use donation_indexer::error::ChainError;
use donation_indexer::rpc::{RouterConfig, RpcRouter};

const BTC_TX: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
const ETH_OK: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const ETH_REVERTED: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
const ETH_WALLET: &str = "0x00000000000000000000000000000000000000aa";

fn adapter(slug: ChainSlug, server: &MockServer) -> std::sync::Arc<dyn ChainAdapter> {
    let router = RpcRouter::new(
        slug,
        vec![server.uri()],
        None,
        vec![],
        RouterConfig {
            timeout: Duration::from_secs(2),
            extra_passes: 0,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        },
    )
    .unwrap();
    let options = AdapterOptions {
        utxo_dialect: UtxoDialect::Esplora,
        receipt_throttle: Duration::ZERO,
    };
    build_adapter(&ChainProfile::builtin(slug), router, &options)
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

// ============================================================
// Esplora
// ============================================================

#[tokio::test]
async fn test_esplora_block_credits_every_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/tip/height"))
        .respond_with(ResponseTemplate::new(200).set_body_string("840002"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/block-height/839998"))
        .respond_with(ResponseTemplate::new(200).set_body_string("blockhash998"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/block/blockhash998"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"timestamp": 1_713_571_767, "tx_count": 1})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/block/blockhash998/txs/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "txid": BTC_TX,
            "vout": [
                {"scriptpubkey_address": "BC1QEXAMPLE", "value": 100_000_000u64},
                {"scriptpubkey_address": "bc1qexample", "value": 50_000_000u64},
                {"scriptpubkey_type": "op_return", "value": 0}
            ]
        }])))
        .mount(&server)
        .await;

    let btc = adapter(ChainSlug::Btc, &server);
    assert_eq!(btc.tip().await.unwrap(), 840_002);

    let block = btc.block(839_998).await.unwrap();
    assert_eq!(block.height, 839_998);
    assert_eq!(block.time.timestamp(), 1_713_571_767);
    assert_eq!(block.credits.len(), 2);
    assert!(block.credits.iter().all(|c| c.to == "bc1qexample" && c.tx_hash == BTC_TX));
    let total = block.credits.iter().fold(U256::ZERO, |acc, c| acc + c.amount);
    assert_eq!(total, U256::from(150_000_000u64));
}

#[tokio::test]
async fn test_esplora_transaction_states() {
    let server = MockServer::start().await;
    let missing = "ab".repeat(32);
    let pending = "cd".repeat(32);
    Mock::given(method("GET"))
        .and(path(format!("/tx/{}", missing)))
        .respond_with(ResponseTemplate::new(404).set_body_string("Transaction not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/tx/{}", pending)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": pending,
            "status": {"confirmed": false},
            "vout": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/tx/{}", BTC_TX)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": BTC_TX,
            "status": {"confirmed": true, "block_height": 839_998, "block_time": 1_713_571_767},
            "vout": [{"scriptpubkey_address": "bc1qexample", "value": 150_000_000u64}]
        })))
        .mount(&server)
        .await;

    let btc = adapter(ChainSlug::Btc, &server);
    assert_eq!(btc.transaction(&missing).await.unwrap(), TxLookup::NotFound);
    assert_eq!(btc.transaction(&pending).await.unwrap(), TxLookup::Pending);

    match btc.transaction(BTC_TX).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 839_998);
            assert_eq!(tx.credits.len(), 1);
            assert_eq!(tx.credits[0].amount, U256::from(150_000_000u64));
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
}

// ============================================================
// EVM
// ============================================================

const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const SENDER: &str = "0x00000000000000000000000000000000000000bb";

fn empty_bloom() -> String {
    format!("0x{}", "0".repeat(512))
}

/// `eth_getBlockByNumber` body; `transactions` are either full objects or hashes.
fn evm_block(number: u64, timestamp: u64, transactions: Vec<Value>) -> Value {
    json!({
        "hash": format!("0x{:064x}", number),
        "parentHash": ZERO_HASH,
        "sha3Uncles": ZERO_HASH,
        "miner": SENDER,
        "stateRoot": ZERO_HASH,
        "transactionsRoot": ZERO_HASH,
        "receiptsRoot": ZERO_HASH,
        "logsBloom": empty_bloom(),
        "difficulty": "0x0",
        "number": format!("0x{:x}", number),
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x5208",
        "timestamp": format!("0x{:x}", timestamp),
        "extraData": "0x",
        "mixHash": ZERO_HASH,
        "nonce": "0x0000000000000000",
        "baseFeePerGas": "0x3b9aca00",
        "size": "0x220",
        "uncles": [],
        "transactions": transactions
    })
}

/// EIP-1559 transfer as returned by `eth_getTransactionByHash`.
fn evm_tx(hash: &str, to: Option<&str>, value: &str, block: Option<u64>) -> Value {
    json!({
        "type": "0x2",
        "chainId": "0x1",
        "nonce": "0x7",
        "gas": "0x5208",
        "maxFeePerGas": "0x77359400",
        "maxPriorityFeePerGas": "0x3b9aca00",
        "gasPrice": "0x77359400",
        "to": to,
        "value": value,
        "accessList": [],
        "input": "0x",
        "r": "0x1",
        "s": "0x2",
        "yParity": "0x0",
        "hash": hash,
        "from": SENDER,
        "blockHash": block.map(|n| format!("0x{:064x}", n)),
        "blockNumber": block.map(|n| format!("0x{:x}", n)),
        "transactionIndex": block.map(|_| "0x0")
    })
}

fn evm_receipt(hash: &str, succeeded: bool) -> Value {
    json!({
        "type": "0x2",
        "status": if succeeded { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": empty_bloom(),
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{:064x}", 16),
        "blockNumber": "0x10",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x77359400",
        "from": SENDER,
        "to": ETH_WALLET,
        "contractAddress": null
    })
}

#[tokio::test]
async fn test_evm_block_and_receipt_filter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getBlockByNumber"})))
        .respond_with(rpc_result(evm_block(
            16,
            0x6500_0000,
            vec![
                evm_tx(ETH_OK, Some("0x00000000000000000000000000000000000000AA"), "0xde0b6b3a7640000", Some(16)),
                evm_tx(ETH_REVERTED, Some(ETH_WALLET), "0x1", Some(16)),
                evm_tx(
                    "0x3333333333333333333333333333333333333333333333333333333333333333",
                    Some(ETH_WALLET),
                    "0x0",
                    Some(16),
                ),
                evm_tx(
                    "0x4444444444444444444444444444444444444444444444444444444444444444",
                    None,
                    "0x5",
                    Some(16),
                ),
            ],
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt", "params": [ETH_OK]})))
        .respond_with(rpc_result(evm_receipt(ETH_OK, true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt", "params": [ETH_REVERTED]})))
        .respond_with(rpc_result(evm_receipt(ETH_REVERTED, false)))
        .expect(1)
        .mount(&server)
        .await;

    let eth = adapter(ChainSlug::Eth, &server);
    let block = eth.block(16).await.unwrap();
    assert_eq!(block.time.timestamp(), 0x6500_0000);
    assert_eq!(block.credits.len(), 2);
    assert_eq!(block.credits[0].to, ETH_WALLET);
    assert_eq!(block.credits[0].tx_hash, ETH_OK);
    assert_eq!(block.credits[0].amount, U256::from(1_000_000_000_000_000_000u128));

    let kept = eth.retain_successful(block.credits).await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].tx_hash, ETH_OK);
}

#[tokio::test]
async fn test_evm_transaction_states() {
    let server = MockServer::start().await;
    let pending = "0x5555555555555555555555555555555555555555555555555555555555555555";
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionByHash", "params": [pending]})))
        .respond_with(rpc_result(evm_tx(pending, Some(ETH_WALLET), "0x1", None)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionByHash", "params": [ETH_REVERTED]})))
        .respond_with(rpc_result(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionByHash", "params": [ETH_OK]})))
        .respond_with(rpc_result(evm_tx(ETH_OK, Some(ETH_WALLET), "0x2386f26fc10000", Some(16))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getBlockByNumber", "params": ["0x10", false]})))
        .respond_with(rpc_result(evm_block(16, 1_700_000_000, vec![json!(ETH_OK)])))
        .expect(1)
        .mount(&server)
        .await;

    let eth = adapter(ChainSlug::Eth, &server);
    assert_eq!(eth.transaction(pending).await.unwrap(), TxLookup::Pending);
    assert_eq!(eth.transaction(ETH_REVERTED).await.unwrap(), TxLookup::NotFound);

    match eth.transaction(ETH_OK).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 16);
            assert_eq!(tx.time.timestamp(), 1_700_000_000);
            assert_eq!(tx.credits.len(), 1);
            assert_eq!(tx.credits[0].to, ETH_WALLET);
            assert_eq!(tx.credits[0].amount, U256::from(10_000_000_000_000_000u64));
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_evm_tip_and_chain_id_check() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_blockNumber"})))
        .respond_with(rpc_result(json!("0x13a8f2c")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_chainId"})))
        .respond_with(rpc_result(json!("0x89")))
        .mount(&server)
        .await;

    assert_eq!(adapter(ChainSlug::Eth, &server).tip().await.unwrap(), 0x13a_8f2c);
    // Polygon's id served to an Ethereum config.
    assert!(adapter(ChainSlug::Eth, &server).probe().await.is_err());
    assert!(adapter(ChainSlug::Pol, &server).probe().await.is_ok());
}

#[tokio::test]
async fn test_evm_malformed_block_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getBlockByNumber"})))
        .respond_with(rpc_result(json!({"number": "0x10", "transactions": "nope"})))
        .mount(&server)
        .await;

    let err = adapter(ChainSlug::Eth, &server).block(16).await.unwrap_err();
    assert!(matches!(err, ChainError::Malformed { chain: ChainSlug::Eth, .. }), "{:?}", err);
}

// ============================================================
// Account family
// ============================================================

#[tokio::test]
async fn test_solana_skipped_slot_is_empty_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getBlock"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32007, "message": "Slot 250000000 was skipped, or missing due to ledger jump to recent snapshot"}
        })))
        .mount(&server)
        .await;

    let sol = adapter(ChainSlug::Sol, &server);
    let block = sol.block(250_000_000).await.unwrap();
    assert_eq!(block.height, 250_000_000);
    assert!(block.credits.is_empty());
}

// ============================================================
// XRP Ledger
// ============================================================

const XRP_DONATION: &str = "rDonationWa11etXXXXXXXXXXXXXXXXXX";

#[tokio::test]
async fn test_xrpl_ledger_counts_delivered_amounts() {
    let server = MockServer::start().await;
    let partial = "A1".repeat(32);
    let plain = "B2".repeat(32);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "ledger"})))
        .respond_with(rpc_result(json!({
            "ledger_index": 86_000_000,
            "validated": true,
            "ledger": {
                "close_time": 760_000_000,
                "transactions": [
                    {
                        "TransactionType": "Payment",
                        "Destination": XRP_DONATION,
                        "Amount": "2000000",
                        "Flags": 131_072,
                        "hash": partial,
                        "metaData": {"TransactionResult": "tesSUCCESS", "delivered_amount": "1500000"}
                    },
                    {
                        "TransactionType": "Payment",
                        "Destination": XRP_DONATION,
                        "Amount": "250000",
                        "hash": plain,
                        "meta": {"TransactionResult": "tesSUCCESS"}
                    },
                    {
                        "TransactionType": "Payment",
                        "Destination": XRP_DONATION,
                        "Amount": "9000000",
                        "hash": "C3".repeat(32),
                        "meta": {"TransactionResult": "tecUNFUNDED_PAYMENT"}
                    },
                    {
                        "TransactionType": "Payment",
                        "Destination": XRP_DONATION,
                        "Amount": {"currency": "USD", "issuer": "rIssuer", "value": "10"},
                        "hash": "D4".repeat(32),
                        "meta": {"TransactionResult": "tesSUCCESS"}
                    },
                    {
                        "TransactionType": "OfferCreate",
                        "hash": "E5".repeat(32),
                        "meta": {"TransactionResult": "tesSUCCESS"}
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let block = adapter(ChainSlug::Xrp, &server).block(86_000_000).await.unwrap();
    assert_eq!(block.time.timestamp(), 760_000_000 + 946_684_800);
    let credits: Vec<_> = block
        .credits
        .iter()
        .map(|c| (c.tx_hash.as_str(), c.to.as_str(), c.amount))
        .collect();
    assert_eq!(
        credits,
        vec![
            (partial.as_str(), XRP_DONATION, U256::from(1_500_000u64)),
            (plain.as_str(), XRP_DONATION, U256::from(250_000u64)),
        ]
    );
}

#[tokio::test]
async fn test_xrpl_transaction_states() {
    let server = MockServer::start().await;
    let missing = "0A".repeat(32);
    let unvalidated = "0B".repeat(32);
    let failed = "0C".repeat(32);
    let paid = "0D".repeat(32);

    let tx_mock = |hash: &str, result: Value| {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tx", "params": [{"transaction": hash}]})))
            .respond_with(rpc_result(result))
    };
    tx_mock(&missing, json!({"error": "txnNotFound", "error_code": 29, "status": "error"}))
        .mount(&server)
        .await;
    tx_mock(
        &unvalidated,
        json!({
            "TransactionType": "Payment",
            "Destination": XRP_DONATION,
            "Amount": "1000000",
            "hash": unvalidated,
            "validated": false
        }),
    )
    .mount(&server)
    .await;
    tx_mock(
        &failed,
        json!({
            "TransactionType": "Payment",
            "Destination": XRP_DONATION,
            "Amount": "1000000",
            "hash": failed,
            "ledger_index": 86_000_001,
            "date": 760_000_004,
            "meta": {"TransactionResult": "tecPATH_DRY"},
            "validated": true
        }),
    )
    .mount(&server)
    .await;
    tx_mock(
        &paid,
        json!({
            "TransactionType": "Payment",
            "Destination": XRP_DONATION,
            "Amount": "3000000",
            "hash": paid,
            "ledger_index": 86_000_002,
            "date": 760_000_008,
            "meta": {"TransactionResult": "tesSUCCESS", "delivered_amount": "3000000"},
            "validated": true
        }),
    )
    .mount(&server)
    .await;

    let xrp = adapter(ChainSlug::Xrp, &server);
    assert_eq!(xrp.transaction(&missing).await.unwrap(), TxLookup::NotFound);
    assert_eq!(xrp.transaction(&unvalidated).await.unwrap(), TxLookup::Pending);

    match xrp.transaction(&failed).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 86_000_001);
            assert!(tx.credits.is_empty());
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
    match xrp.transaction(&paid).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 86_000_002);
            assert_eq!(tx.time.timestamp(), 760_000_008 + 946_684_800);
            assert_eq!(tx.credits.len(), 1);
            assert_eq!(tx.credits[0].amount, U256::from(3_000_000u64));
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
}

// ============================================================
// Stellar Horizon
// ============================================================

#[tokio::test]
async fn test_horizon_ledger_pages_through_payments() {
    let server = MockServer::start().await;
    let native = "1f".repeat(32);
    let created = "2e".repeat(32);

    let mut first_page = vec![json!({
        "type": "payment",
        "asset_type": "native",
        "to": "gdonationxlm",
        "amount": "10.5000000",
        "transaction_hash": native,
        "transaction_successful": true,
        "paging_token": "1"
    })];
    first_page.extend((2..=200).map(|i| {
        json!({
            "type": "payment",
            "asset_type": "credit_alphanum4",
            "asset_code": "USDC",
            "to": "GDONATIONXLM",
            "amount": "1.0000000",
            "transaction_hash": native,
            "paging_token": i.to_string()
        })
    }));

    Mock::given(method("GET"))
        .and(path("/ledgers/100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"sequence": 100, "closed_at": "2024-04-20T00:00:00Z"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ledgers/100/payments"))
        .and(query_param("cursor", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"records": [{
            "type": "create_account",
            "account": "GNEWACCOUNT",
            "starting_balance": "2.0000000",
            "transaction_hash": created,
            "paging_token": "201"
        }]}})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ledgers/100/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"records": first_page}})))
        .expect(1)
        .mount(&server)
        .await;

    let block = adapter(ChainSlug::Xlm, &server).block(100).await.unwrap();
    assert_eq!(block.time.timestamp(), 1_713_571_200);
    let credits: Vec<_> = block
        .credits
        .iter()
        .map(|c| (c.tx_hash.as_str(), c.to.as_str(), c.amount))
        .collect();
    assert_eq!(
        credits,
        vec![
            (native.as_str(), "GDONATIONXLM", U256::from(105_000_000u64)),
            (created.as_str(), "GNEWACCOUNT", U256::from(20_000_000u64)),
        ]
    );
}

#[tokio::test]
async fn test_horizon_transaction_lookup() {
    let server = MockServer::start().await;
    let missing = "3d".repeat(32);
    let created = "4c".repeat(32);
    Mock::given(method("GET"))
        .and(path(format!("/transactions/{}", missing)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": 404, "title": "Resource Missing"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/transactions/{}", created)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hash": created,
            "ledger": 101,
            "created_at": "2024-04-20T00:00:05Z",
            "successful": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/transactions/{}/payments", created)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"records": [{
            "type": "create_account",
            "account": "GNEWACCOUNT",
            "starting_balance": "1.5000000",
            "transaction_hash": created
        }]}})))
        .mount(&server)
        .await;

    let xlm = adapter(ChainSlug::Xlm, &server);
    assert_eq!(xlm.transaction(&missing).await.unwrap(), TxLookup::NotFound);
    match xlm.transaction(&created).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 101);
            assert_eq!(tx.credits.len(), 1);
            assert_eq!(tx.credits[0].to, "GNEWACCOUNT");
            assert_eq!(tx.credits[0].amount, U256::from(15_000_000u64));
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
}

// ============================================================
// TRON
// ============================================================

const TRX_DONATION: &str = "TDonationWa11etXXXXXXXXXXXXXXXXXXX";

fn tron_transfer(tx_id: &str, outcome: &str, contract_type: &str, amount: u64) -> Value {
    json!({
        "txID": tx_id,
        "ret": [{"contractRet": outcome}],
        "raw_data": {"contract": [{
            "type": contract_type,
            "parameter": {"value": {"owner_address": "TSender", "to_address": TRX_DONATION, "amount": amount}}
        }]}
    })
}

#[tokio::test]
async fn test_tron_block_skips_unsuccessful_transfers() {
    let server = MockServer::start().await;
    let ok = "5a".repeat(32);
    Mock::given(method("POST"))
        .and(path("/wallet/getblockbynum"))
        .and(body_partial_json(json!({"num": 60_000_000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blockID": "00".repeat(32),
            "block_header": {"raw_data": {"number": 60_000_000, "timestamp": 1_713_571_767_000i64}},
            "transactions": [
                tron_transfer(&ok, "SUCCESS", "TransferContract", 5_000_000),
                tron_transfer(&"6b".repeat(32), "REVERT", "TransferContract", 7_000_000),
                tron_transfer(&"7c".repeat(32), "OUT_OF_ENERGY", "TransferContract", 8_000_000),
                tron_transfer(&"8d".repeat(32), "SUCCESS", "TriggerSmartContract", 9_000_000)
            ]
        })))
        .mount(&server)
        .await;

    let block = adapter(ChainSlug::Trx, &server).block(60_000_000).await.unwrap();
    assert_eq!(block.time.timestamp(), 1_713_571_767);
    assert_eq!(block.credits.len(), 1);
    assert_eq!(block.credits[0].tx_hash, ok);
    assert_eq!(block.credits[0].to, TRX_DONATION);
    assert_eq!(block.credits[0].amount, U256::from(5_000_000u64));
}

#[tokio::test]
async fn test_tron_transaction_states() {
    let server = MockServer::start().await;
    let missing = "9e".repeat(32);
    let pending = "af".repeat(32);
    let confirmed = "b0".repeat(32);

    for (hash, body) in [
        (&missing, json!({})),
        (&pending, tron_transfer(&pending, "SUCCESS", "TransferContract", 1_000_000)),
        (&confirmed, tron_transfer(&confirmed, "SUCCESS", "TransferContract", 2_000_000)),
    ] {
        Mock::given(method("POST"))
            .and(path("/wallet/gettransactionbyid"))
            .and(body_partial_json(json!({"value": hash})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/wallet/gettransactioninfobyid"))
        .and(body_partial_json(json!({"value": pending})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": pending})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wallet/gettransactioninfobyid"))
        .and(body_partial_json(json!({"value": confirmed})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": confirmed,
            "blockNumber": 60_000_001,
            "blockTimeStamp": 1_713_571_770_000i64
        })))
        .mount(&server)
        .await;

    let trx = adapter(ChainSlug::Trx, &server);
    assert_eq!(trx.transaction(&missing).await.unwrap(), TxLookup::NotFound);
    assert_eq!(trx.transaction(&pending).await.unwrap(), TxLookup::Pending);
    match trx.transaction(&confirmed).await.unwrap() {
        TxLookup::Confirmed(tx) => {
            assert_eq!(tx.height, 60_000_001);
            assert_eq!(tx.time.timestamp(), 1_713_571_770);
            assert_eq!(tx.credits.len(), 1);
            assert_eq!(tx.credits[0].amount, U256::from(2_000_000u64));
        }
        other => panic!("expected confirmed, got {:?}", other),
    }
}

// ============================================================
// Substrate (Subscan)
// ============================================================

#[tokio::test]
async fn test_subscan_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10004,
            "message": "Record Not Found",
            "generated_at": 1_713_571_767,
            "data": null
        })))
        .mount(&server)
        .await;

    let err = adapter(ChainSlug::Dot, &server).tip().await.unwrap_err();
    match err {
        ChainError::Malformed { chain, detail } => {
            assert_eq!(chain, ChainSlug::Dot);
            assert!(detail.contains("10004"), "{}", detail);
        }
        other => panic!("expected malformed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subscan_block_keeps_native_transfers() {
    let server = MockServer::start().await;
    let dot = "c1".repeat(32);
    let unlabeled = "d2".repeat(32);
    Mock::given(method("POST"))
        .and(path("/api/v2/scan/transfers"))
        .and(body_partial_json(json!({"block_range": "20000000-20000000", "page": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "Success",
            "data": {"count": 4, "transfers": [
                {"hash": format!("0x{}", dot), "to": "15DonationDot", "amount": "12.5", "asset_symbol": "DOT", "success": true, "block_timestamp": 1_713_571_767},
                {"hash": format!("0x{}", "e3".repeat(32)), "to": "15DonationDot", "amount": "100", "asset_symbol": "USDT", "success": true},
                {"hash": format!("0x{}", unlabeled.to_uppercase()), "to": "15OtherDot", "amount": "1", "asset_symbol": "", "success": true},
                {"hash": format!("0x{}", "f4".repeat(32)), "to": "15DonationDot", "amount": "3", "asset_symbol": "DOT", "success": false}
            ]}
        })))
        .mount(&server)
        .await;

    let block = adapter(ChainSlug::Dot, &server).block(20_000_000).await.unwrap();
    assert_eq!(block.time.timestamp(), 1_713_571_767);
    let credits: Vec<_> = block
        .credits
        .iter()
        .map(|c| (c.tx_hash.clone(), c.to.as_str(), c.amount))
        .collect();
    assert_eq!(
        credits,
        vec![
            (format!("0x{}", dot), "15DonationDot", U256::from(125_000_000_000u64)),
            (format!("0x{}", unlabeled), "15OtherDot", U256::from(10_000_000_000u64)),
        ]
    );
}

// ============================================================
// Cosmos LCD
// ============================================================

#[tokio::test]
async fn test_cosmos_block_bank_sends() {
    let server = MockServer::start().await;
    let multi = "A7".repeat(32);
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_responses": [
                {
                    "height": "20000000",
                    "txhash": multi,
                    "code": 0,
                    "timestamp": "2024-04-20T00:00:00Z",
                    "tx": {"body": {"messages": [{
                        "@type": "/cosmos.bank.v1beta1.MsgMultiSend",
                        "inputs": [{"address": "cosmos1sender", "coins": [{"denom": "uatom", "amount": "1250000"}]}],
                        "outputs": [
                            {"address": "cosmos1donation", "coins": [
                                {"denom": "uatom", "amount": "1000000"},
                                {"denom": "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2", "amount": "5"}
                            ]},
                            {"address": "COSMOS1SECOND", "coins": [{"denom": "uatom", "amount": "250000"}]}
                        ]
                    }]}}
                },
                {
                    "height": "20000000",
                    "txhash": "B8".repeat(32),
                    "code": 5,
                    "timestamp": "2024-04-20T00:00:00Z",
                    "tx": {"body": {"messages": [{
                        "@type": "/cosmos.bank.v1beta1.MsgSend",
                        "from_address": "cosmos1sender",
                        "to_address": "cosmos1donation",
                        "amount": [{"denom": "uatom", "amount": "999"}]
                    }]}}
                },
                {
                    "height": "20000000",
                    "txhash": "C9".repeat(32),
                    "code": 0,
                    "timestamp": "2024-04-20T00:00:00Z",
                    "tx": {"body": {"messages": [{
                        "@type": "/cosmos.bank.v1beta1.MsgSend",
                        "from_address": "cosmos1sender",
                        "to_address": "cosmos1donation",
                        "amount": [{"denom": "uosmo", "amount": "777"}]
                    }]}}
                }
            ],
            "pagination": {"total": "3"}
        })))
        .mount(&server)
        .await;

    let block = adapter(ChainSlug::Atom, &server).block(20_000_000).await.unwrap();
    assert_eq!(block.time.timestamp(), 1_713_571_200);
    let credits: Vec<_> = block
        .credits
        .iter()
        .map(|c| (c.tx_hash.as_str(), c.to.as_str(), c.amount))
        .collect();
    assert_eq!(
        credits,
        vec![
            (multi.as_str(), "cosmos1donation", U256::from(1_000_000u64)),
            (multi.as_str(), "cosmos1second", U256::from(250_000u64)),
        ]
    );
}

#[tokio::test]
async fn test_cosmos_missing_transaction() {
    let server = MockServer::start().await;
    let gone = "D0".repeat(32);
    let unknown = "E1".repeat(32);
    Mock::given(method("GET"))
        .and(path(format!("/cosmos/tx/v1beta1/txs/{}", gone)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cosmos/tx/v1beta1/txs/{}", unknown)))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"code": 5, "message": format!("tx not found: {}", unknown)})),
        )
        .mount(&server)
        .await;

    let atom = adapter(ChainSlug::Atom, &server);
    assert_eq!(atom.transaction(&gone).await.unwrap(), TxLookup::NotFound);
    assert_eq!(atom.transaction(&unknown).await.unwrap(), TxLookup::NotFound);
}
