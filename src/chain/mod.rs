pub mod poller;
pub mod rpc;
pub mod types;

pub use poller::BuyEventPoller;
pub use rpc::{block_windows, decode_logs, BuyLogFilter, RpcClient};
pub use types::{decode_buy_log, decode_token_state, token_topic, RpcLog, TokenState};
