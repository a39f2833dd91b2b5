use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    ethereum: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

/// Pull `ethereum.usd` out of a CoinGecko `simple/price` body.
pub fn parse_eth_usd(body: &str) -> Option<f64> {
    let resp: SimplePriceResponse = serde_json::from_str(body).ok()?;
    resp.ethereum
        .and_then(|q| q.usd)
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// ETH/USD spot price, or `fallback` when the lookup fails.
pub async fn fetch_eth_usd(http: &reqwest::Client, url: &str, fallback: f64) -> f64 {
    let body = match http.get(url).send().await {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => resp.text().await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    match body {
        Ok(body) => match parse_eth_usd(&body) {
            Some(price) => {
                tracing::debug!(price, "Fetched ETH/USD price");
                price
            }
            None => {
                tracing::warn!(fallback, "ETH/USD response had no usable price");
                fallback
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, fallback, "Failed to fetch ETH/USD price");
            fallback
        }
    }
}
