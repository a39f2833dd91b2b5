use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use launch_chart::aggregator::{build_candles, CandleRequest, CandleSeries, Placement};
use launch_chart::chain::{BuyEventPoller, BuyLogFilter, RpcClient, TokenState};
use launch_chart::config::{parse_timeframe, Config};
use launch_chart::countdown::{
    format_candle_countdown, format_time_left, seconds_until_next_bucket,
};
use launch_chart::model::purchase::RawPurchaseEvent;
use launch_chart::model::timeframe::Timeframe;
use launch_chart::price::fetch_eth_usd;

const ETH_PRICE_REFRESH_SECS: u64 = 60;

#[derive(Debug, Default)]
struct CliArgs {
    command: String,
    target: Option<String>,
    timeframe: Option<String>,
    timestamps: bool,
    timestamps_file: Option<String>,
    from_block: Option<u64>,
    eth_usd: Option<f64>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs {
        command: args.first().cloned().unwrap_or_else(|| "help".to_string()),
        ..CliArgs::default()
    };
    let mut positional = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--timestamps" => cli.timestamps = true,
            "--timestamps-file" => {
                let v = iter
                    .next()
                    .ok_or_else(|| anyhow!("--timestamps-file requires a path"))?;
                cli.timestamps_file = Some(v.clone());
            }
            "--from-block" => {
                let v = iter
                    .next()
                    .ok_or_else(|| anyhow!("--from-block requires a block number"))?;
                cli.from_block = Some(v.parse().with_context(|| format!("bad block '{}'", v))?);
            }
            "--eth-usd" => {
                let v = iter
                    .next()
                    .ok_or_else(|| anyhow!("--eth-usd requires a price"))?;
                cli.eth_usd = Some(v.parse().with_context(|| format!("bad price '{}'", v))?);
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{}`", flag),
            _ => positional.push(arg.clone()),
        }
    }
    let mut positional = positional.into_iter();
    cli.target = positional.next();
    cli.timeframe = positional.next();
    Ok(cli)
}

fn print_usage() {
    println!("launch-chart <command> [args]");
    println!();
    println!("  snapshot <events.json> [timeframe] [--timestamps-file F] [--eth-usd P]");
    println!("  token <token_id> [timeframe] [--timestamps] [--from-block N] [--eth-usd P]");
    println!("  watch <token_id> [timeframe] [--from-block N]");
    println!("  help");
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(&config.logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[derive(Debug, Serialize)]
struct ChartReport<'a> {
    now: i64,
    eth_usd: f64,
    price_change: f64,
    price_change_percent: f64,
    progress_percent: f64,
    bonded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_left: Option<String>,
    next_candle_in: String,
    #[serde(flatten)]
    series: &'a CandleSeries,
}

struct ChartContext {
    timeframe: Timeframe,
    max_candles: usize,
    config: Config,
}

impl ChartContext {
    fn new(config: Config, timeframe_arg: Option<&str>) -> Result<Self> {
        let timeframe = match timeframe_arg {
            Some(label) => parse_timeframe(label)?,
            None => config.chart.timeframe()?,
        };
        let max_candles = config.chart.max_candles_for(timeframe);
        Ok(Self {
            timeframe,
            max_candles,
            config,
        })
    }

    fn render(
        &self,
        events: &[RawPurchaseEvent],
        eth_usd: f64,
        placement: Placement,
        token: Option<&TokenState>,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let curve = self.config.curve.bonding_curve()?;
        let request = CandleRequest::new(self.timeframe, curve, eth_usd, now)
            .with_max_candles(self.max_candles)
            .with_placement(placement);
        let series = build_candles(&request, events)?;
        let (price_change, price_change_percent) = series.price_change();
        // the contract's own total wins over what the log feed has seen so far
        let raised = token.map_or(series.raised_eth, TokenState::raised_eth);

        let report = ChartReport {
            now,
            eth_usd,
            price_change,
            price_change_percent,
            progress_percent: curve.progress_percent(raised),
            bonded: token.is_some_and(|t| t.bonded) || curve.is_bonded(raised),
            failed: token.map(|t| t.failed),
            time_left: token.map(|t| format_time_left(t.seconds_left(now))),
            next_candle_in: format_candle_countdown(seconds_until_next_bucket(
                now,
                self.timeframe,
            )),
            series: &series,
        };
        tracing::info!(
            timeframe = %self.timeframe,
            market_cap = series.current_market_cap,
            events = events.len(),
            skipped = series.skipped,
            out_of_order = series.out_of_order,
            "Chart refreshed"
        );
        serde_json::to_string(&report).context("failed to encode chart report")
    }
}

fn load_events_file(path: &Path) -> Result<Vec<RawPurchaseEvent>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_timestamps_file(path: &Path) -> Result<HashMap<u64, i64>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: HashMap<String, i64> = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    raw.into_iter()
        .map(|(block, ts)| {
            block
                .parse::<u64>()
                .map(|b| (b, ts))
                .with_context(|| format!("bad block number key '{}'", block))
        })
        .collect()
}

fn parse_token_id(cli: &CliArgs) -> Result<u64> {
    let raw = cli
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("`{}` requires a token id", cli.command))?;
    raw.parse()
        .with_context(|| format!("invalid token id '{}'", raw))
}

async fn resolve_eth_usd(http: &reqwest::Client, config: &Config, cli: &CliArgs) -> f64 {
    match cli.eth_usd {
        Some(p) => p,
        None => {
            fetch_eth_usd(http, &config.chain.eth_price_url, config.chart.fallback_eth_usd).await
        }
    }
}

async fn run_snapshot(ctx: &ChartContext, cli: &CliArgs, http: &reqwest::Client) -> Result<()> {
    let path = cli
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("`snapshot` requires an events file"))?;
    let events = load_events_file(Path::new(path))?;
    let placement = match cli.timestamps_file.as_deref() {
        Some(ts_path) => Placement::BlockTimestamps(load_timestamps_file(Path::new(ts_path))?),
        None => Placement::RecencyAnchored,
    };
    let eth_usd = resolve_eth_usd(http, &ctx.config, cli).await;
    println!("{}", ctx.render(&events, eth_usd, placement, None)?);
    Ok(())
}

/// Contract-side sale state. Failures are logged; the chart still renders
/// from the log feed alone.
async fn fetch_token_state(rpc: &RpcClient, config: &Config, token_id: u64) -> Option<TokenState> {
    match rpc.token_state(&config.chain.factory_address, token_id).await {
        Ok(Some(state)) => Some(state),
        Ok(None) => {
            tracing::warn!(token_id, "Factory has no record for token");
            None
        }
        Err(e) => {
            tracing::warn!(token_id, error = %e, "Failed to read token state");
            None
        }
    }
}

async fn fetch_history(
    ctx: &ChartContext,
    cli: &CliArgs,
    rpc: &RpcClient,
    filter: &BuyLogFilter,
    token_id: u64,
) -> Result<(Vec<RawPurchaseEvent>, u64)> {
    let head = rpc.block_number().await.context("failed to read chain head")?;
    let from = cli.from_block.unwrap_or(ctx.config.chain.deploy_block).min(head);
    let events = rpc
        .buy_events(filter, token_id, from, head)
        .await
        .with_context(|| format!("failed to fetch Buy events for token {}", token_id))?;
    tracing::info!(token_id, from, head, count = events.len(), "Fetched Buy history");
    Ok((events, head))
}

async fn placement_for(
    rpc: &RpcClient,
    events: &[RawPurchaseEvent],
    timestamps: bool,
) -> Placement {
    if !timestamps {
        return Placement::RecencyAnchored;
    }
    let blocks: Vec<u64> = events
        .iter()
        .filter_map(|ev| ev.validate().ok())
        .map(|ev| ev.block_number)
        .collect();
    Placement::BlockTimestamps(rpc.block_timestamps(&blocks).await)
}

async fn run_token(ctx: &ChartContext, cli: &CliArgs, http: &reqwest::Client) -> Result<()> {
    let token_id = parse_token_id(cli)?;
    let rpc = RpcClient::with_client(http.clone(), &ctx.config.chain.rpc_url);
    let filter = BuyLogFilter::from(&ctx.config.chain);
    let (events, _) = fetch_history(ctx, cli, &rpc, &filter, token_id).await?;
    let placement = placement_for(&rpc, &events, cli.timestamps).await;
    let token = fetch_token_state(&rpc, &ctx.config, token_id).await;
    let eth_usd = resolve_eth_usd(http, &ctx.config, cli).await;
    println!("{}", ctx.render(&events, eth_usd, placement, token.as_ref())?);
    Ok(())
}

async fn run_watch(ctx: &ChartContext, cli: &CliArgs, http: &reqwest::Client) -> Result<()> {
    let token_id = parse_token_id(cli)?;
    let rpc = RpcClient::with_client(http.clone(), &ctx.config.chain.rpc_url);
    let filter = BuyLogFilter::from(&ctx.config.chain);
    let (history, head) = fetch_history(ctx, cli, &rpc, &filter, token_id).await?;
    let mut poller = BuyEventPoller::new(token_id, ctx.config.chain.initial_lookback)
        .with_history(history, head);

    let mut token = fetch_token_state(&rpc, &ctx.config, token_id).await;
    let mut eth_usd = resolve_eth_usd(http, &ctx.config, cli).await;
    println!(
        "{}",
        ctx.render(poller.events(), eth_usd, Placement::RecencyAnchored, token.as_ref())?
    );

    let mut poll_tick =
        tokio::time::interval(Duration::from_millis(ctx.config.chain.poll_interval_ms.max(250)));
    let mut price_tick = tokio::time::interval(Duration::from_secs(ETH_PRICE_REFRESH_SECS));
    poll_tick.tick().await;
    price_tick.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received");
                break;
            }
            _ = price_tick.tick() => {
                if cli.eth_usd.is_none() {
                    eth_usd = fetch_eth_usd(
                        http,
                        &ctx.config.chain.eth_price_url,
                        ctx.config.chart.fallback_eth_usd,
                    )
                    .await;
                }
                token = fetch_token_state(&rpc, &ctx.config, token_id).await.or(token);
            }
            _ = poll_tick.tick() => {
                match poller.poll(&rpc, &filter).await {
                    Ok(added) if added > 0 => {
                        token = fetch_token_state(&rpc, &ctx.config, token_id).await.or(token);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(token_id, error = %e, "Buy event poll failed"),
                }
                // re-render every tick so flat candles roll forward
                let report = ctx.render(
                    poller.events(),
                    eth_usd,
                    Placement::RecencyAnchored,
                    token.as_ref(),
                )?;
                println!("{}", report);
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;
    if matches!(cli.command.as_str(), "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config);
    tracing::info!(
        command = %cli.command,
        rpc_url = %config.chain.rpc_url,
        "Starting launch-chart"
    );

    let ctx = ChartContext::new(config, cli.timeframe.as_deref())?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("failed to build HTTP client")?;

    match cli.command.as_str() {
        "snapshot" => run_snapshot(&ctx, &cli, &http).await,
        "token" => run_token(&ctx, &cli, &http).await,
        "watch" => run_watch(&ctx, &cli, &http).await,
        other => bail!(
            "unknown command `{}`. expected one of: snapshot|token|watch|help",
            other
        ),
    }
}
