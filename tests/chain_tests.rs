use launch_chart::chain::types::{parse_hex_u64, token_call_data, RpcResponse};
use launch_chart::chain::{
    decode_buy_log, decode_logs, decode_token_state, token_topic, BuyEventPoller, RpcLog,
};
use launch_chart::error::ChartError;
use launch_chart::model::purchase::RawPurchaseEvent;

const BUY_TOPIC: &str = "0x7280bdf45dbd84499327763e7e91b31324c8fc5e8d556813089f71c9a8d91f5c";
const BUYER: &str = "0x0000000000000000000000001111111111111111111111111111111111111111";

fn word(v: u128) -> String {
    format!("{:064x}", v)
}

fn buy_log(eth: u128, tokens: u128, raised: u128, block: &str, tx: &str) -> RpcLog {
    RpcLog {
        address: "0xc72c354bd1608d5e79b822dc4416cd039bad8524".to_string(),
        topics: vec![BUY_TOPIC.to_string(), token_topic(7), BUYER.to_string()],
        data: format!("0x{}{}{}", word(eth), word(tokens), word(raised)),
        block_number: Some(block.to_string()),
        transaction_hash: Some(tx.to_string()),
        removed: false,
    }
}

#[test]
fn token_topic_is_left_padded() {
    assert_eq!(
        token_topic(7),
        "0x0000000000000000000000000000000000000000000000000000000000000007"
    );
}

#[test]
fn decodes_buy_log_words() {
    let log = buy_log(
        500_000_000_000_000_000,
        1_234_000_000_000_000_000_000,
        4_250_000_000_000_000_000,
        "0x259a5c0",
        "0xdead",
    );
    let ev = decode_buy_log(&log).unwrap().validate().unwrap();
    assert_eq!(ev.buyer, "0x1111111111111111111111111111111111111111");
    assert_eq!(ev.eth_amount, 500_000_000_000_000_000);
    assert_eq!(ev.token_amount, 1_234_000_000_000_000_000_000);
    assert_eq!(ev.cumulative_raised, 4_250_000_000_000_000_000);
    assert_eq!(ev.block_number, 39_429_568);
    assert_eq!(ev.transaction_hash, "0xdead");
    assert!((ev.raised_eth() - 4.25).abs() < 1e-12);
}

#[test]
fn rejects_short_data() {
    let mut log = buy_log(1, 1, 1, "0x1", "0x01");
    log.data = format!("0x{}", word(1));
    assert!(matches!(decode_buy_log(&log), Err(ChartError::MalformedEvent(_))));
}

#[test]
fn rejects_values_wider_than_u128() {
    let mut log = buy_log(1, 1, 1, "0x1", "0x01");
    log.data = format!("0x{}{}{}", "f".repeat(64), word(1), word(1));
    assert!(matches!(decode_buy_log(&log), Err(ChartError::MalformedEvent(_))));
}

#[test]
fn rejects_removed_and_pending_logs() {
    let mut removed = buy_log(1, 1, 1, "0x1", "0x01");
    removed.removed = true;
    assert!(decode_buy_log(&removed).is_err());

    let mut pending = buy_log(1, 1, 1, "0x1", "0x01");
    pending.block_number = None;
    assert!(decode_buy_log(&pending).is_err());
}

#[test]
fn rejects_bad_hex() {
    let mut log = buy_log(1, 1, 1, "0x1", "0x01");
    log.data = "0xzz".to_string();
    assert!(matches!(decode_buy_log(&log), Err(ChartError::Hex(_))));
}

#[test]
fn decode_logs_drops_bad_entries() {
    let mut bad = buy_log(1, 1, 1, "0x2", "0x02");
    bad.topics.truncate(2);
    let logs = vec![buy_log(1, 1, 1, "0x1", "0x01"), bad];
    assert_eq!(decode_logs(&logs).len(), 1);
}

#[test]
fn rpc_log_deserializes_from_node_json() {
    let body = format!(
        r#"{{"address":"0xc72c","topics":["{}","{}","{}"],"data":"0x{}{}{}","blockNumber":"0x10","transactionHash":"0xab","logIndex":"0x0","removed":false}}"#,
        BUY_TOPIC,
        token_topic(7),
        BUYER,
        word(1),
        word(2),
        word(3)
    );
    let log: RpcLog = serde_json::from_str(&body).unwrap();
    let ev = decode_buy_log(&log).unwrap().validate().unwrap();
    assert_eq!(ev.block_number, 16);
    assert_eq!(ev.cumulative_raised, 3);
}

#[test]
fn rpc_error_object_becomes_error() {
    let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#;
    let resp: RpcResponse<String> = serde_json::from_str(body).unwrap();
    match resp.into_result() {
        Err(ChartError::Rpc { code, message }) => {
            assert_eq!(code, -32005);
            assert_eq!(message, "limit exceeded");
        }
        other => panic!("unexpected {:?}", other),
    }

    let null_block: RpcResponse<String> =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":2,"result":null}"#).unwrap();
    assert!(null_block.into_result().unwrap().is_none());
}

#[test]
fn parse_hex_quantities() {
    assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
    assert_eq!(parse_hex_u64("0x259a5c0").unwrap(), 39_429_568);
    assert!(parse_hex_u64("1234").is_err());
    assert!(parse_hex_u64("0x").is_err());
}

fn raw(tx: &str, block: u64) -> RawPurchaseEvent {
    RawPurchaseEvent::from_parts("0xb", 1, 1, 1, block, tx)
}

#[test]
fn poller_first_range_looks_back() {
    let poller = BuyEventPoller::new(7, 100);
    assert_eq!(poller.next_range(1_000), Some((900, 1_000)));
    assert_eq!(BuyEventPoller::new(7, 100).next_range(50), Some((0, 50)));
}

#[test]
fn poller_only_requests_new_blocks() {
    let mut poller = BuyEventPoller::new(7, 100);
    poller.ingest(vec![raw("0x01", 950)], 1_000);
    assert_eq!(poller.last_block(), Some(1_000));
    assert_eq!(poller.next_range(1_000), None);
    assert_eq!(poller.next_range(999), None);
    assert_eq!(poller.next_range(1_010), Some((1_001, 1_010)));
}

#[test]
fn poller_dedups_across_polls() {
    let mut poller = BuyEventPoller::new(7, 100).with_history(vec![raw("0xAA", 10)], 20);
    let added = poller.ingest(vec![raw("0xaa", 10), raw("0xbb", 21)], 30);
    assert_eq!(added, 1);
    assert_eq!(poller.events().len(), 2);
    assert_eq!(poller.token_id(), 7);
}

#[test]
fn poller_never_moves_backwards() {
    let mut poller = BuyEventPoller::new(7, 100);
    poller.ingest(Vec::new(), 500);
    poller.ingest(Vec::new(), 400);
    assert_eq!(poller.last_block(), Some(500));
}

const TOKEN: &str = "0000000000000000000000002222222222222222222222222222222222222222";
const CREATOR: &str = "0000000000000000000000003333333333333333333333333333333333333333";

fn token_return(token: &str, raised: u128, deadline: u128, bonded: bool, uri: &str) -> String {
    let mut tail = hex::encode(uri.as_bytes());
    while tail.len() % 64 != 0 {
        tail.push('0');
    }
    format!(
        "0x{}{}{}{}{}{}{}{}{}{}{}{}",
        token,
        CREATOR,
        word(10 * 32),
        word(raised),
        word(0),
        word(800_000_000 * 1_000_000_000_000_000_000),
        word(deadline),
        word(0),
        word(bonded as u128),
        word(0),
        word(uri.len() as u128),
        tail
    )
}

#[test]
fn token_call_data_uses_tokens_selector() {
    assert_eq!(
        token_call_data(7),
        "0x4f64b2be0000000000000000000000000000000000000000000000000000000000000007"
    );
}

#[test]
fn decodes_token_state() {
    let data = token_return(TOKEN, 4_250_000_000_000_000_000, 1_700_086_400, false, "ipfs://meta");
    let state = decode_token_state(&data).unwrap().unwrap();

    assert_eq!(state.token_address, "0x2222222222222222222222222222222222222222");
    assert_eq!(state.creator, "0x3333333333333333333333333333333333333333");
    assert_eq!(state.metadata_uri, "ipfs://meta");
    assert!((state.raised_eth() - 4.25).abs() < 1e-12);
    assert_eq!(state.tokens_sold, 800_000_000 * 1_000_000_000_000_000_000);
    assert_eq!(state.deadline, 1_700_086_400);
    assert!(!state.bonded);
    assert!(!state.failed);
    assert_eq!(state.seconds_left(1_700_000_000), 86_400);
    assert_eq!(state.seconds_left(1_800_000_000), 0);
}

#[test]
fn bonded_flag_and_empty_uri() {
    let data = token_return(TOKEN, 8_500_000_000_000_000_000, 0, true, "");
    let state = decode_token_state(&data).unwrap().unwrap();
    assert!(state.bonded);
    assert_eq!(state.metadata_uri, "");
}

#[test]
fn zero_token_address_means_no_token() {
    let data = token_return(&"0".repeat(64), 0, 0, false, "");
    assert!(decode_token_state(&data).unwrap().is_none());
}

#[test]
fn rejects_truncated_token_state() {
    let full = token_return(TOKEN, 1, 1, false, "ipfs://meta");
    assert!(matches!(
        decode_token_state(&full[..2 + 64 * 9]),
        Err(ChartError::MalformedResponse(_))
    ));
    // head intact, string tail cut off
    assert!(matches!(
        decode_token_state(&full[..2 + 64 * 11]),
        Err(ChartError::MalformedResponse(_))
    ));
}
