//! MetaApi REST客户端（MT5账户）

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::bridge::{
    BridgeStatus, OrderOutcome, OrderRequest, OrderTicket, SymbolMapper, TradeBridge,
};
use crate::core::error::{BotError, Result};
use crate::core::types::{ExecutionMode, OrderKind, Quote, Side};

/// 成交/挂单成功的返回码
const RETCODE_PLACED: i64 = 10008;
const RETCODE_DONE: i64 = 10009;
const RETCODE_DONE_PARTIAL: i64 = 10010;

#[derive(Debug, Clone)]
pub struct MetaApiConfig {
    pub token: String,
    pub account_id: String,
    pub region: String,
    pub timeout_secs: u64,
}

impl MetaApiConfig {
    pub fn base_url(&self) -> String {
        format!("https://mt-client-api-v1.{}.agiliumtrade.ai", self.region)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeResponse {
    #[serde(default)]
    numeric_code: i64,
    #[serde(default)]
    string_code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    position_id: Option<String>,
}

impl TradeResponse {
    fn is_success(&self) -> bool {
        matches!(
            self.numeric_code,
            RETCODE_PLACED | RETCODE_DONE | RETCODE_DONE_PARTIAL
        )
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInformation {
    #[serde(default)]
    broker: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    balance: Option<f64>,
    #[serde(default)]
    equity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetaApiErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

pub struct MetaApiBridge {
    client: Client,
    config: MetaApiConfig,
    symbols: SymbolMapper,
}

impl MetaApiBridge {
    pub fn new(config: MetaApiConfig, symbols: SymbolMapper) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(BotError::ConfigError("METAAPI_TOKEN 未配置".to_string()));
        }
        if config.account_id.trim().is_empty() {
            return Err(BotError::validation("account_id", "must not be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            symbols,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    fn account_path(&self, suffix: &str) -> String {
        format!(
            "{}/users/current/accounts/{}{}",
            self.config.base_url(),
            urlencoding::encode(&self.config.account_id),
            suffix
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<T> {
        debug!("📤 MetaApi {} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .header("auth-token", &self.config.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BotError::TimeoutError {
                    operation: "metaapi".to_string(),
                    timeout_seconds: self.config.timeout_secs,
                }
            } else {
                BotError::NetworkError(e)
            }
        })?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(map_error(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn trade(&self, body: Value) -> Result<TradeResponse> {
        let url = self.account_path("/trade");
        self.send(Method::POST, &url, Some(body)).await
    }

    /// 读取账户信息，`/trading setup` 用它验证连接
    pub async fn verify(&self) -> Result<BridgeStatus> {
        let url = self.account_path("/account-information");
        let info: AccountInformation = self.send(Method::GET, &url, None).await?;
        Ok(BridgeStatus {
            mode: Some(ExecutionMode::Live),
            connected: true,
            account_id: Some(self.config.account_id.clone()),
            region: Some(self.config.region.clone()),
            broker: info.broker,
            balance: info.balance,
            equity: info.equity,
            currency: info.currency,
            last_error: None,
        })
    }
}

fn map_error(status: StatusCode, text: &str) -> BotError {
    let message = serde_json::from_str::<MetaApiErrorBody>(text)
        .ok()
        .map(|b| {
            if b.message.is_empty() {
                b.error
            } else {
                format!("{} {}", b.error, b.message).trim().to_string()
            }
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| text.to_string());

    match status {
        StatusCode::UNAUTHORIZED => BotError::AuthError(message),
        StatusCode::FORBIDDEN => BotError::PermissionError(message),
        StatusCode::NOT_FOUND => BotError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => BotError::RateLimitError(message, None),
        _ => BotError::ApiError {
            code: status.as_u16(),
            message,
        },
    }
}

/// 构建开仓请求体
fn order_body(broker_symbol: &str, request: &OrderRequest) -> Value {
    let (action, open_price) = match (request.side, request.kind) {
        (Side::Long, OrderKind::Market) => ("ORDER_TYPE_BUY", None),
        (Side::Short, OrderKind::Market) => ("ORDER_TYPE_SELL", None),
        (Side::Long, OrderKind::Limit(price)) => ("ORDER_TYPE_BUY_LIMIT", Some(price)),
        (Side::Short, OrderKind::Limit(price)) => ("ORDER_TYPE_SELL_LIMIT", Some(price)),
    };

    let mut body = json!({
        "actionType": action,
        "symbol": broker_symbol,
        "volume": request.volume,
        "stopLoss": request.stop_loss,
        "takeProfit": request.take_profit,
        "comment": request.comment,
    });
    if let Some(price) = open_price {
        body["openPrice"] = json!(price);
    }
    body
}

/// 修改止损的请求体：已成交按持仓修改，挂单按订单修改
fn modify_body(ticket: &OrderTicket, stop_loss: f64) -> Value {
    match &ticket.position_id {
        Some(position_id) => json!({
            "actionType": "POSITION_MODIFY",
            "positionId": position_id,
            "stopLoss": stop_loss,
        }),
        None => {
            let mut body = json!({
                "actionType": "ORDER_MODIFY",
                "orderId": ticket.order_id,
                "stopLoss": stop_loss,
            });
            if let Some(price) = ticket.open_price {
                body["openPrice"] = json!(price);
            }
            body
        }
    }
}

#[async_trait]
impl TradeBridge for MetaApiBridge {
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderOutcome> {
        let broker_symbol = self.symbols.to_broker(&request.symbol);
        let response = self.trade(order_body(&broker_symbol, request)).await?;

        if !response.is_success() {
            warn!(
                "❌ MetaApi拒单: {} {} ({}: {})",
                request.side.as_str(),
                broker_symbol,
                response.string_code,
                response.message
            );
            return Ok(OrderOutcome::Rejected {
                mode: ExecutionMode::Live,
                reason: format!("{} {}", response.string_code, response.message)
                    .trim()
                    .to_string(),
            });
        }

        let order_id = response
            .order_id
            .clone()
            .or_else(|| response.position_id.clone())
            .unwrap_or_default();
        info!(
            "✅ MetaApi下单成功: {} {} {} 手, order={}",
            request.side.as_str(),
            broker_symbol,
            request.volume,
            order_id
        );

        let open_price = match request.kind {
            OrderKind::Limit(price) => Some(price),
            OrderKind::Market => None,
        };
        Ok(OrderOutcome::Filled(OrderTicket {
            order_id,
            position_id: response.position_id,
            symbol: broker_symbol,
            side: request.side,
            mode: ExecutionMode::Live,
            volume: request.volume,
            open_price,
            opened_at: Utc::now(),
        }))
    }

    async fn move_stop_loss(&self, ticket: &OrderTicket, stop_loss: f64) -> Result<()> {
        let response = self.trade(modify_body(ticket, stop_loss)).await?;
        if response.is_success() {
            info!("✅ 止损已移动: order={} sl={}", ticket.order_id, stop_loss);
            Ok(())
        } else {
            Err(BotError::BridgeError(format!(
                "modify rejected: {} {}",
                response.string_code, response.message
            )))
        }
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let broker_symbol = self.symbols.to_broker(symbol);
        let url = self.account_path(&format!(
            "/symbols/{}/current-price",
            urlencoding::encode(&broker_symbol)
        ));
        let price: PriceResponse = self.send(Method::GET, &url, None).await?;
        Ok(Quote {
            symbol: symbol.to_string(),
            bid: price.bid,
            ask: price.ask,
            source: ExecutionMode::Live,
            timestamp: Utc::now(),
        })
    }

    async fn status(&self) -> BridgeStatus {
        match self.verify().await {
            Ok(status) => status,
            Err(e) => BridgeStatus {
                mode: Some(ExecutionMode::Live),
                connected: false,
                account_id: Some(self.config.account_id.clone()),
                region: Some(self.config.region.clone()),
                last_error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(side: Side, kind: OrderKind) -> OrderRequest {
        OrderRequest {
            symbol: "US100".into(),
            side,
            kind,
            volume: 0.01,
            stop_loss: 14930.0,
            take_profit: 15100.0,
            comment: "signal 1".into(),
        }
    }

    #[test]
    fn order_body_action_types() {
        let body = order_body("NAS100", &request(Side::Long, OrderKind::Market));
        assert_eq!(body["actionType"], "ORDER_TYPE_BUY");
        assert_eq!(body["symbol"], "NAS100");
        assert_eq!(body["takeProfit"], 15100.0);
        assert!(body.get("openPrice").is_none());

        let body = order_body("NAS100", &request(Side::Short, OrderKind::Limit(15010.0)));
        assert_eq!(body["actionType"], "ORDER_TYPE_SELL_LIMIT");
        assert_eq!(body["openPrice"], 15010.0);
    }

    #[test]
    fn modify_uses_position_when_known() {
        let mut ticket = OrderTicket {
            order_id: "7".into(),
            position_id: Some("9".into()),
            symbol: "EURUSD".into(),
            side: Side::Long,
            mode: ExecutionMode::Live,
            volume: 0.01,
            open_price: Some(1.1),
            opened_at: Utc::now(),
        };
        let body = modify_body(&ticket, 1.1);
        assert_eq!(body["actionType"], "POSITION_MODIFY");
        assert_eq!(body["positionId"], "9");

        ticket.position_id = None;
        let body = modify_body(&ticket, 1.1);
        assert_eq!(body["actionType"], "ORDER_MODIFY");
        assert_eq!(body["orderId"], "7");
    }

    #[test]
    fn error_mapping() {
        let err = map_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"UnauthorizedError","message":"bad token"}"#,
        );
        assert!(matches!(err, BotError::AuthError(m) if m == "UnauthorizedError bad token"));
        let err = map_error(StatusCode::BAD_GATEWAY, "upstream");
        assert!(err.is_retryable());
    }

    #[test]
    fn rejects_empty_credentials() {
        let config = MetaApiConfig {
            token: "".into(),
            account_id: "acc".into(),
            region: "new-york".into(),
            timeout_secs: 5,
        };
        assert!(MetaApiBridge::new(config, SymbolMapper::default()).is_err());
    }
}
