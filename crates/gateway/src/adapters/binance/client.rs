//! Signed REST client for Binance USDT-M futures
//!
//! One HTTP request per trait call, no retry (see [`RetryingClient`](crate::RetryingClient)).
//! Symbol filters are fetched from `exchangeInfo` once per symbol and cached.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tranche_core::{OrderId, OrderSpec, Price, SymbolFilters};
use tranche_ports::{ExchangeClient, ExchangeError, ExchangeResult, OpenOrder, OrderAck};

use super::signer::{Signer, encode_query};
use super::types::{ApiErrorBody, ExchangeInfo, OrderResponse, TickerPrice};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayResult, from_http};

const ORDER_PATH: &str = "/fapi/v1/order";
const OPEN_ORDERS_PATH: &str = "/fapi/v1/openOrders";
const ALL_OPEN_ORDERS_PATH: &str = "/fapi/v1/allOpenOrders";
const TICKER_PRICE_PATH: &str = "/fapi/v1/ticker/price";
const EXCHANGE_INFO_PATH: &str = "/fapi/v1/exchangeInfo";

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

// Exchange error codes with special handling
const CODE_TOO_MANY_REQUESTS: i64 = -1003;
const CODE_UNKNOWN: i64 = -1000;
const CODE_TIMEOUT: i64 = -1001;
const CODE_TIMESTAMP_OUTSIDE_WINDOW: i64 = -1021;
const CODE_CANCEL_REJECTED: i64 = -2011;

pub struct BinanceFuturesClient {
    http: Client,
    config: Arc<GatewayConfig>,
    signer: Signer,
    filters: Mutex<HashMap<String, SymbolFilters>>,
}

impl BinanceFuturesClient {
    pub fn new(config: Arc<GatewayConfig>) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        info!(
            "Binance futures client for {} ({})",
            config.base_url,
            if config.testnet { "testnet" } else { "mainnet" }
        );

        Ok(Self {
            http,
            signer: Signer::new(config.api_secret.clone()),
            config,
            filters: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn filter_cache(&self) -> MutexGuard<'_, HashMap<String, SymbolFilters>> {
        self.filters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let mut url = format!("{}{}", self.config.base_url, path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(params));
        }
        let response = self.http.get(&url).send().await.map_err(from_http)?;
        read_response(response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = self.signer.signed_query(
            params,
            Utc::now().timestamp_millis(),
            self.config.recv_window_ms,
        )?;
        let url = format!("{}{}?{}", self.config.base_url, path, query);
        debug!("{} {} {}", method, path, encode_query(params));

        let response = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(from_http)?;
        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> ExchangeResult<T> {
    let status = response.status();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs * 1000);
    let body = response.text().await.map_err(from_http)?;

    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(format!("{e}: {body}")))
    } else {
        let err = classify_error(status, retry_after_ms, &body);
        warn!("request failed with HTTP {}: {}", status.as_u16(), err);
        Err(err)
    }
}

/// Map a non-2xx response onto the error taxonomy
pub(crate) fn classify_error(
    status: StatusCode,
    retry_after_ms: Option<u64>,
    body: &str,
) -> ExchangeError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return ExchangeError::RateLimited { retry_after_ms };
    }
    if status.is_server_error() {
        return ExchangeError::Transport(format!("HTTP {}: {}", status.as_u16(), body));
    }
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { code, .. }) if code == CODE_TOO_MANY_REQUESTS => {
            ExchangeError::RateLimited { retry_after_ms }
        }
        Ok(ApiErrorBody { code, msg })
            if code == CODE_UNKNOWN
                || code == CODE_TIMEOUT
                || code == CODE_TIMESTAMP_OUTSIDE_WINDOW =>
        {
            ExchangeError::Transport(format!("{code}: {msg}"))
        }
        Ok(ApiErrorBody { code, msg }) => ExchangeError::Rejected { code, message: msg },
        Err(_) => ExchangeError::Rejected {
            code: -i64::from(status.as_u16()),
            message: body.to_string(),
        },
    }
}

/// Request parameters for a new order, in the order they are signed
pub(crate) fn order_params(spec: &OrderSpec) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", spec.symbol().to_string()),
        ("side", spec.side().as_str().to_string()),
        ("type", spec.order_type().as_str().to_string()),
        ("quantity", spec.quantity().normalize().to_string()),
    ];
    if let Some(price) = spec.price() {
        params.push(("price", price.normalize().to_string()));
    }
    if let Some(stop) = spec.stop_price() {
        params.push(("stopPrice", stop.normalize().to_string()));
    }
    if let Some(tif) = spec.time_in_force() {
        params.push(("timeInForce", tif.as_str().to_string()));
    }
    params.push(("positionSide", spec.position_side().as_str().to_string()));
    if spec.reduce_only() {
        params.push(("reduceOnly", "true".to_string()));
    }
    if let Some(id) = spec.client_order_id() {
        params.push(("newClientOrderId", id.to_string()));
    }
    params.push(("newOrderRespType", "RESULT".to_string()));
    params
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    async fn place_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderAck> {
        let response: OrderResponse = self
            .signed(Method::POST, ORDER_PATH, &order_params(spec))
            .await?;
        let ack = response.into_ack()?;
        info!(
            "Order {} accepted: {} {} {} {} ({})",
            ack.order_id,
            spec.order_type(),
            spec.side(),
            spec.quantity(),
            spec.symbol(),
            ack.status
        );
        Ok(ack)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<bool> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        match self
            .signed::<OrderResponse>(Method::DELETE, ORDER_PATH, &params)
            .await
        {
            Ok(_) => Ok(true),
            // Already filled, cancelled or unknown
            Err(ExchangeError::Rejected { code, .. }) if code == CODE_CANCEL_REJECTED => {
                debug!("cancel of {} rejected: order no longer open", order_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let response: OrderResponse = self.signed(Method::GET, ORDER_PATH, &params).await?;
        response.into_ack()
    }

    async fn query_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> ExchangeResult<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        let response: OrderResponse = self.signed(Method::GET, ORDER_PATH, &params).await?;
        response.into_ack()
    }

    async fn list_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let params = [("symbol", symbol.to_string())];
        let responses: Vec<OrderResponse> =
            self.signed(Method::GET, OPEN_ORDERS_PATH, &params).await?;

        let mut orders = Vec::with_capacity(responses.len());
        for response in responses {
            let order_id = response.order_id;
            match response.into_open_order()? {
                Some(order) => orders.push(order),
                None => debug!("skipping open order {} of an unsupported type", order_id),
            }
        }
        Ok(orders)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        let params = [("symbol", symbol.to_string())];
        let reply: ApiErrorBody = self
            .signed(Method::DELETE, ALL_OPEN_ORDERS_PATH, &params)
            .await?;
        info!("Cancel all on {}: {}", symbol, reply.msg);
        Ok(())
    }

    async fn current_price(&self, symbol: &str) -> ExchangeResult<Price> {
        let ticker: TickerPrice = self
            .public_get(TICKER_PRICE_PATH, &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters> {
        let cached = self.filter_cache().get(symbol).copied();
        if let Some(filters) = cached {
            return Ok(filters);
        }

        let info: ExchangeInfo = self.public_get(EXCHANGE_INFO_PATH, &[]).await?;
        let mut cache = self.filter_cache();
        for s in &info.symbols {
            cache.insert(s.symbol.clone(), s.to_filters());
        }
        cache
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::rejected(-1121, format!("Invalid symbol {symbol}")))
    }

    fn name(&self) -> &str {
        "binance-futures"
    }
}
