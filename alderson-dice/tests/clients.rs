//! End-to-end client and contract routing against in-process wallets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alderson_dice::{
    Address, ChainId, ClientFactory, ClientOptions, Clients, ContractAbi, ContractHandle,
    ContractKind, DynSolValue, Eip1193Provider, Error, ProviderHandle, ProviderRpcError,
    SupportedChain, TransportKind, U256, bind, bind_read_only, create_read_client,
    create_write_client,
};
use alloy::dyn_abi::DynSolType;
use alloy::primitives::address;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

const GAME_ABI: &str = include_str!("fixtures/dice_game.json");
const GAME: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
const PLAYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const TX_HASH: &str = "0x2f1c5c1b2b0d1f6f0e6ad8e3b8f0f9f4b1c7a4e3d2c1b0a9f8e7d6c5b4a39281";

/// Wallet answering from a fixed table and recording every request.
#[derive(Default)]
struct Recorder {
    answers: HashMap<&'static str, Result<Value, ProviderRpcError>>,
    log: Mutex<Vec<(String, Value)>>,
}

impl Recorder {
    fn answering(
        answers: impl IntoIterator<Item = (&'static str, Result<Value, ProviderRpcError>)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            answers: answers.into_iter().collect(),
            log: Mutex::default(),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn handle(self: &Arc<Self>) -> ProviderHandle {
        let provider: Arc<dyn Eip1193Provider> = Arc::clone(self) as _;
        ProviderHandle::from(provider)
    }

    fn methods(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("log")
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn params_of(&self, method: &str) -> Option<Value> {
        self.log
            .lock()
            .expect("log")
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl Eip1193Provider for Recorder {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.log
            .lock()
            .expect("log")
            .push((method.to_owned(), params));
        self.answers.get(method).cloned().unwrap_or_else(|| {
            Err(ProviderRpcError::new(
                ProviderRpcError::UNSUPPORTED_METHOD,
                format!("{method} not supported"),
            ))
        })
    }
}

fn game_abi() -> ContractAbi {
    ContractAbi::from_json(GAME_ABI).expect("fixture abi")
}

fn supply_answer() -> (&'static str, Result<Value, ProviderRpcError>) {
    ("eth_call", Ok(json!(format!("0x{:064x}", 42))))
}

fn no_multicall() -> ClientFactory {
    ClientFactory::new(ClientOptions::default().with_multicall(false))
}

#[tokio::test]
async fn arbitrum_without_a_wallet_reads_over_http_and_refuses_writes() {
    let chain_id: ChainId = "0xa4b1".parse().expect("hex chain id");
    let read = create_read_client(chain_id, None).expect("read client");

    assert_eq!(read.transport_kind(), TransportKind::Http);
    assert_eq!(read.chain().chain, SupportedChain::Arbitrum);
    assert_eq!(read.chain().native_currency.symbol, "ETH");

    let game = bind(read, None, GAME, game_abi());
    assert!(!game.is_writable());
    assert!(matches!(game.clients(), Clients::ReadOnly(_)));
    assert!(game.is_read_only("totalSupply").expect("known function"));

    let args = game
        .parse_args("roll", &["1", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"])
        .expect("args");
    let err = game.write("roll", &args, PLAYER).await.expect_err("no wallet");
    assert!(matches!(err, Error::MissingProvider));
}

#[tokio::test]
async fn write_clients_always_need_a_wallet() {
    for chain in SupportedChain::ALL {
        assert!(matches!(
            create_write_client(*chain, None),
            Err(Error::MissingProvider)
        ));
    }
    assert!(matches!(
        create_write_client(ChainId(137), None),
        Err(Error::MissingProvider)
    ));
}

#[tokio::test]
async fn wallet_presence_only_changes_the_transport() {
    let wallet = Recorder::silent();
    let plain = create_read_client(SupportedChain::Base, None).expect("plain");
    let backed = create_read_client(SupportedChain::Base, Some(wallet.handle())).expect("backed");

    assert_eq!(plain.transport_kind(), TransportKind::Http);
    assert_eq!(backed.transport_kind(), TransportKind::Fallback);
    assert!(std::ptr::eq(plain.chain(), backed.chain()));
    assert!(wallet.methods().is_empty());
}

#[tokio::test]
async fn binding_twice_gives_identical_reads() {
    let wallet = Recorder::answering([supply_answer()]);
    let factory = no_multicall();
    let read = factory
        .create_read_client(SupportedChain::Base, Some(wallet.handle()))
        .expect("read client");

    let first = bind_read_only(read.clone(), GAME, game_abi());
    let second = bind_read_only(read, GAME, game_abi());

    let a = first.read("totalSupply", &[]).await.expect("first read");
    let b = second.read("totalSupply", &[]).await.expect("second read");
    assert_eq!(a, vec![DynSolValue::Uint(U256::from(42), 256)]);
    assert_eq!(a, b);
    assert_eq!(wallet.methods(), ["eth_call", "eth_call"]);
}

#[tokio::test]
async fn unknown_functions_fail_at_call_time() {
    let wallet = Recorder::answering([supply_answer()]);
    let read = no_multicall()
        .create_read_client(SupportedChain::Localhost, Some(wallet.handle()))
        .expect("read client");
    let game = bind_read_only(read, GAME, game_abi());

    let err = game.read("cheat", &[]).await.expect_err("unknown");
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(wallet.methods().is_empty());
}

/// A read client whose wallet is `reader` and a write client over `signer`,
/// both on Localhost.
fn split_handle(reader: &Arc<Recorder>, signer: &Arc<Recorder>) -> ContractHandle {
    let factory = no_multicall();
    let read = factory
        .create_read_client(SupportedChain::Localhost, Some(reader.handle()))
        .expect("read client");
    let write = factory
        .create_write_client(SupportedChain::Localhost, Some(signer.handle()))
        .expect("write client");
    bind(read, Some(write), GAME, game_abi())
}

#[tokio::test]
async fn writes_go_to_the_write_client_only() {
    let reader = Recorder::answering([supply_answer()]);
    let signer = Recorder::answering([("eth_sendTransaction", Ok(json!(TX_HASH)))]);
    let game = split_handle(&reader, &signer);
    assert!(game.is_writable());

    let args = game
        .parse_args("roll", &["3", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"])
        .expect("args");
    let hash = game.write("roll", &args, PLAYER).await.expect("submitted");
    assert_eq!(hash.to_string(), TX_HASH);

    game.read("totalSupply", &[]).await.expect("read");

    assert_eq!(signer.methods(), ["eth_sendTransaction"]);
    assert_eq!(reader.methods(), ["eth_call"]);

    let params = signer.params_of("eth_sendTransaction").expect("sent");
    let tx = &params[0];
    let to = tx["to"].as_str().expect("to");
    assert!(to.eq_ignore_ascii_case(&GAME.to_string()));
    let from = tx["from"].as_str().expect("from");
    assert!(from.eq_ignore_ascii_case(&PLAYER.to_string()));
}

#[tokio::test]
async fn payable_writes_carry_value() {
    let reader = Recorder::silent();
    let signer = Recorder::answering([("eth_sendTransaction", Ok(json!(TX_HASH)))]);
    let game = split_handle(&reader, &signer);

    let args = game.parse_args("buyDice", &["2"]).expect("args");
    game.write_with_value("buyDice", &args, PLAYER, U256::from(1_000_u64))
        .await
        .expect("submitted");

    let params = signer.params_of("eth_sendTransaction").expect("sent");
    assert_eq!(params[0]["value"], json!("0x3e8"));
}

#[tokio::test]
async fn user_rejection_surfaces_as_a_provider_error() {
    let reader = Recorder::silent();
    let signer = Recorder::answering([(
        "eth_sendTransaction",
        Err(ProviderRpcError::new(
            ProviderRpcError::USER_REJECTED,
            "User rejected the request.",
        )),
    )]);
    let game = split_handle(&reader, &signer);

    let args = game.parse_args("buyDice", &["1"]).expect("args");
    let err = game
        .write("buyDice", &args, PLAYER)
        .await
        .expect_err("rejected");
    assert!(
        matches!(err, Error::Provider(ref e) if e.code == ProviderRpcError::USER_REJECTED),
        "got {err:?}"
    );
}

#[tokio::test]
async fn wallet_accounts_and_network_checks() {
    let signer = Recorder::answering([
        ("eth_requestAccounts", Ok(json!([PLAYER.to_string()]))),
        ("eth_chainId", Ok(json!("0x1"))),
    ]);
    let write = create_write_client(SupportedChain::Localhost, Some(signer.handle()))
        .expect("write client");
    assert_eq!(write.transport_kind(), TransportKind::InjectedProvider);

    let accounts = write.request_addresses().await.expect("accounts");
    assert_eq!(accounts, vec![PLAYER]);

    let err = write.ensure_chain().await.expect_err("wallet on mainnet");
    assert!(matches!(
        err,
        Error::ChainMismatch {
            expected: 1337,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn client_pairs_follow_the_wallet() {
    let factory = ClientFactory::default();
    let read_only = factory
        .create_clients(SupportedChain::Mainnet, None)
        .expect("read only");
    assert!(read_only.write().is_none());
    assert!(matches!(read_only.require_write(), Err(Error::MissingProvider)));

    let wallet = Recorder::silent();
    let paired = factory
        .create_clients(SupportedChain::Mainnet, Some(wallet.handle()))
        .expect("paired");
    assert_eq!(paired.read().transport_kind(), TransportKind::Fallback);
    assert_eq!(
        paired.require_write().expect("write").transport_kind(),
        TransportKind::InjectedProvider
    );
    assert_eq!(paired.chain().chain_id(), 1);
}

#[tokio::test]
async fn mismatched_client_pairs_are_rejected() {
    let wallet = Recorder::silent();
    let read = create_read_client(SupportedChain::Base, None).expect("read");
    let write = create_write_client(SupportedChain::Mainnet, Some(wallet.handle())).expect("write");
    assert!(matches!(
        Clients::read_write(read, write),
        Err(Error::InvalidArgument(_))
    ));
}

fn rolled_log() -> Value {
    json!({
        "address": GAME.to_string(),
        "topics": [
            alloy::primitives::keccak256("Rolled(uint256,uint8)").to_string(),
            format!("0x{:064x}", 7),
        ],
        "data": format!("0x{:064x}", 5),
        "blockHash": format!("0x{:064x}", 0xb10c),
        "blockNumber": "0x2a",
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "logIndex": "0x1",
        "removed": false,
    })
}

#[tokio::test]
async fn watched_events_arrive_through_the_read_client() {
    let wallet = Recorder::answering([
        ("eth_newFilter", Ok(json!("0x1"))),
        ("eth_getFilterChanges", Ok(json!([rolled_log()]))),
    ]);
    let read = no_multicall()
        .create_read_client(SupportedChain::Localhost, Some(wallet.handle()))
        .expect("read client");
    let game = bind_read_only(read, GAME, game_abi());

    let mut events = game.watch_events("Rolled").await.expect("filter installed");
    let log = tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("first poll")
        .expect("one log");
    assert_eq!(log.address(), GAME);
    assert_eq!(log.block_number, Some(42));
    assert_eq!(log.transaction_hash.map(|h| h.to_string()).as_deref(), Some(TX_HASH));

    let params = wallet.params_of("eth_newFilter").expect("filter requested");
    let address = params[0]["address"].as_str().expect("address");
    assert!(address.eq_ignore_ascii_case(&GAME.to_string()));
    assert_eq!(wallet.methods()[..2], ["eth_newFilter", "eth_getFilterChanges"]);
}

/// Multicall3, at the same address on every chain that has it.
const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// HTTP JSON-RPC node answering `eth_blockNumber` with 16 and every
/// `eth_call` with the word 42, unpacking Multicall3 `aggregate3` batches.
struct Node;

impl Node {
    fn call_result(tx: &Value) -> Value {
        let word = U256::from(42).to_be_bytes_vec();
        let to = tx["to"].as_str().unwrap_or_default();
        if !to.eq_ignore_ascii_case(&MULTICALL3.to_string()) {
            return json!(alloy::primitives::hex::encode_prefixed(&word));
        }

        let input = tx["input"].as_str().or_else(|| tx["data"].as_str()).expect("calldata");
        let input = alloy::primitives::hex::decode(input).expect("hex calldata");
        let call3 = DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Bool,
            DynSolType::Bytes,
        ]);
        let params = DynSolType::Tuple(vec![DynSolType::Array(Box::new(call3))]);
        let decoded = params.abi_decode_params(&input[4..]).expect("aggregate3 calls");
        let count = match decoded {
            DynSolValue::Tuple(fields) => match fields.first() {
                Some(DynSolValue::Array(calls)) => calls.len(),
                _ => 0,
            },
            _ => 0,
        };

        let results = (0..count)
            .map(|_| DynSolValue::Tuple(vec![DynSolValue::Bool(true), DynSolValue::Bytes(word.clone())]))
            .collect();
        let encoded = DynSolValue::Tuple(vec![DynSolValue::Array(results)]).abi_encode_params();
        json!(alloy::primitives::hex::encode_prefixed(encoded))
    }
}

impl Respond for Node {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("json-rpc request");
        let result = match body["method"].as_str() {
            Some("eth_blockNumber") => json!("0x10"),
            Some("eth_chainId") => json!("0x2105"),
            Some("eth_call") => Self::call_result(&body["params"][0]),
            other => panic!("unexpected method {other:?}"),
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": result,
        }))
    }
}

async fn node() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(Node).mount(&server).await;
    server
}

fn over(server: &MockServer, multicall: bool) -> ClientFactory {
    ClientFactory::new(
        ClientOptions::default()
            .with_fallback_url(server.uri().parse().expect("server url"))
            .with_multicall(multicall),
    )
}

#[tokio::test]
async fn disconnected_wallet_reads_fall_back_to_http_with_multicall() {
    let server = node().await;
    let wallet = Recorder::answering([(
        "eth_call",
        Err(ProviderRpcError::new(
            ProviderRpcError::DISCONNECTED,
            "wallet locked",
        )),
    )]);
    let read = over(&server, true)
        .create_read_client(SupportedChain::Base, Some(wallet.handle()))
        .expect("read client");
    assert_eq!(read.transport_kind(), TransportKind::Fallback);
    assert!(read.multicall());

    let game = bind_read_only(read, GAME, game_abi());
    let (a, b) = tokio::join!(game.read("totalSupply", &[]), game.read("totalSupply", &[]));
    let expected = vec![DynSolValue::Uint(U256::from(42), 256)];
    assert_eq!(a.expect("first read"), expected);
    assert_eq!(b.expect("second read"), expected);

    assert!(wallet.methods().iter().all(|m| m == "eth_call"));
    assert!(!wallet.methods().is_empty(), "wallet is asked first");
    let served = server.received_requests().await.expect("recording on");
    assert!(!served.is_empty(), "http member answered");
}

#[tokio::test]
async fn methods_the_wallet_lacks_are_served_over_http() {
    let server = node().await;
    let wallet = Recorder::silent();
    let read = over(&server, false)
        .create_read_client(SupportedChain::Base, Some(wallet.handle()))
        .expect("read client");

    assert_eq!(read.block_number().await.expect("block number"), 16);
    assert_eq!(wallet.methods(), ["eth_blockNumber"]);
    let served = server.received_requests().await.expect("recording on");
    assert_eq!(served.len(), 1);
}

#[tokio::test]
async fn wallet_reverts_are_not_retried_over_http() {
    let server = node().await;
    let wallet = Recorder::answering([(
        "eth_call",
        Err(ProviderRpcError::new(3, "execution reverted: paused")),
    )]);
    let read = over(&server, false)
        .create_read_client(SupportedChain::Base, Some(wallet.handle()))
        .expect("read client");
    let game = bind_read_only(read, GAME, game_abi());

    game.read("totalSupply", &[]).await.expect_err("reverted");
    let served = server.received_requests().await.expect("recording on");
    assert!(served.is_empty(), "revert is the answer");
}

#[test]
fn contract_kinds_name_their_artifacts() {
    let names: Vec<_> = ContractKind::ALL.iter().map(|k| k.artifact_name()).collect();
    assert_eq!(names, ["AldersonDiceGameV0", "AldersonDiceNFT"]);
}
