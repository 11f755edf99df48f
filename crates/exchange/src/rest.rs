use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use common::{
    Balance, Error, Exchange, Market, MarketPosition, OrderConfirmation, OrderRequest, Result,
};

use crate::auth::KalshiAuth;
use crate::stats::ApiStats;

/// Signed paths carry the API prefix even though `base_url` already includes
/// it in the request URL.
const SIGN_PREFIX: &str = "/trade-api/v2";

/// REST API client for Kalshi. The single mediator for all exchange traffic:
/// every call, success or failure, is recorded into the shared [`ApiStats`].
pub struct KalshiClient {
    base_url: String,
    auth: KalshiAuth,
    http: reqwest::Client,
    stats: Arc<ApiStats>,
}

impl KalshiClient {
    pub fn new(base_url: impl Into<String>, auth: KalshiAuth, stats: Arc<ApiStats>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            auth,
            http,
            stats,
        })
    }

    /// Handle to the shared stats, for injection into the dashboard API.
    pub fn stats(&self) -> Arc<ApiStats> {
        self.stats.clone()
    }

    async fn get_json<T: DeserializeOwned>(&self, label: &str, path: &str) -> Result<T> {
        let headers = self.auth.headers("GET", &format!("{SIGN_PREFIX}{path}"), "")?;
        let url = format!("{}{}", self.base_url, path);

        let started = Instant::now();
        let result = self.send(self.http.get(&url).headers(headers)).await;
        self.finish(label, started, &result);

        serde_json::from_str(&result?).map_err(Error::from)
    }

    async fn post_json<T: DeserializeOwned>(&self, label: &str, path: &str, body: String) -> Result<T> {
        let headers = self.auth.headers("POST", &format!("{SIGN_PREFIX}{path}"), &body)?;
        let url = format!("{}{}", self.base_url, path);

        let started = Instant::now();
        let result = self
            .send(
                self.http
                    .post(&url)
                    .headers(headers)
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await;
        self.finish(label, started, &result);

        serde_json::from_str(&result?).map_err(Error::from)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let resp = request.send().await.map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn finish(&self, label: &str, started: Instant, result: &Result<String>) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.record(label, elapsed_ms, result.is_err());
    }
}

#[async_trait]
impl Exchange for KalshiClient {
    async fn balance(&self) -> Result<Balance> {
        self.get_json("GET /portfolio/balance", "/portfolio/balance")
            .await
    }

    async fn positions(&self) -> Result<Vec<MarketPosition>> {
        let resp: PositionsResponse = self
            .get_json("GET /portfolio/positions", "/portfolio/positions")
            .await?;
        Ok(resp.market_positions)
    }

    async fn markets(&self, series_ticker: &str, status: &str) -> Result<Vec<Market>> {
        let path = format!("/markets?series_ticker={series_ticker}&status={status}&limit=20");
        let resp: MarketsResponse = self.get_json("GET /markets", &path).await?;
        Ok(resp.markets)
    }

    async fn market(&self, ticker: &str) -> Result<Market> {
        let resp: MarketResponse = self
            .get_json("GET /markets/{ticker}", &format!("/markets/{ticker}"))
            .await?;
        Ok(resp.market)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        // Kalshi prices the two sides as complements of 100 cents.
        let (yes_price, no_price) = match order.side {
            common::MarketSide::Yes => (order.price_cents, 100 - order.price_cents),
            common::MarketSide::No => (100 - order.price_cents, order.price_cents),
        };

        let body = json!({
            "ticker": order.ticker,
            "client_order_id": order.client_order_id,
            "action": "buy",
            "side": order.side,
            "count": order.count,
            "type": "limit",
            "yes_price": yes_price,
            "no_price": no_price,
        })
        .to_string();

        debug!(ticker = %order.ticker, side = %order.side, count = order.count, "Placing order");

        let resp: OrderResponse = self
            .post_json("POST /portfolio/orders", "/portfolio/orders", body)
            .await?;

        Ok(OrderConfirmation {
            order_id: resp.order.order_id,
        })
    }
}

// ─── Response envelopes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Deserialize)]
struct MarketResponse {
    market: Market,
}

#[derive(Deserialize)]
struct PositionsResponse {
    #[serde(default)]
    market_positions: Vec<MarketPosition>,
}

#[derive(Deserialize)]
struct OrderResponse {
    order: OrderBody,
}

#[derive(Deserialize)]
struct OrderBody {
    order_id: String,
}
