//! 交易桥路由：优先真实账户，不可用时回退到模拟器

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bridge::{
    BridgeStatus, MetaApiBridge, MetaApiConfig, OrderOutcome, OrderRequest, OrderTicket,
    SimulatedBridge, SymbolMapper, TradeBridge,
};
use crate::core::config::BridgeConfig;
use crate::core::error::{BotError, Result};
use crate::core::types::{ExecutionMode, Quote};

pub struct FallbackBridge {
    live: RwLock<Option<Arc<dyn TradeBridge>>>,
    simulator: Arc<SimulatedBridge>,
    last_error: RwLock<Option<String>>,
    metaapi_token: Option<String>,
    settings: BridgeConfig,
}

impl FallbackBridge {
    pub fn new(settings: BridgeConfig, metaapi_token: Option<String>) -> Self {
        Self {
            live: RwLock::new(None),
            simulator: Arc::new(SimulatedBridge::new()),
            last_error: RwLock::new(None),
            metaapi_token,
            settings,
        }
    }

    pub fn with_simulator(mut self, simulator: Arc<SimulatedBridge>) -> Self {
        self.simulator = simulator;
        self
    }

    /// 直接装入真实交易桥（测试或启动时已验证的连接）
    pub async fn set_live(&self, live: Arc<dyn TradeBridge>) {
        *self.live.write().await = Some(live);
        *self.last_error.write().await = None;
    }

    pub async fn has_live(&self) -> bool {
        self.live.read().await.is_some()
    }

    pub fn settings(&self) -> &BridgeConfig {
        &self.settings
    }

    pub fn simulator(&self) -> &Arc<SimulatedBridge> {
        &self.simulator
    }

    /// 连接MetaApi账户，验证成功后替换当前真实交易桥
    pub async fn configure_live(
        &self,
        account_id: &str,
        region: Option<&str>,
    ) -> Result<BridgeStatus> {
        let token = self
            .metaapi_token
            .clone()
            .ok_or_else(|| BotError::ConfigError("METAAPI_TOKEN is not configured".to_string()))?;

        let config = MetaApiConfig {
            token,
            account_id: account_id.trim().to_string(),
            region: region
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(&self.settings.region)
                .to_string(),
            timeout_secs: self.settings.request_timeout_secs,
        };
        let bridge = MetaApiBridge::new(config, SymbolMapper::new(&self.settings.symbol_map))?;

        match bridge.verify().await {
            Ok(status) => {
                info!("✅ MetaApi账户已连接: {}", bridge.account_id());
                self.set_live(Arc::new(bridge)).await;
                Ok(status)
            }
            Err(e) => {
                warn!("❌ MetaApi账户验证失败: {}", e);
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    async fn record_error(&self, error: &BotError) {
        *self.last_error.write().await = Some(error.to_string());
    }

    async fn live(&self) -> Option<Arc<dyn TradeBridge>> {
        self.live.read().await.clone()
    }
}

#[async_trait]
impl TradeBridge for FallbackBridge {
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderOutcome> {
        if let Some(live) = self.live().await {
            match live.open_position(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!("⚠️ 真实下单失败，改用模拟成交: {}", e);
                    self.record_error(&e).await;
                }
            }
        }
        self.simulator.open_position(request).await
    }

    async fn move_stop_loss(&self, ticket: &OrderTicket, stop_loss: f64) -> Result<()> {
        match ticket.mode {
            ExecutionMode::Simulated => self.simulator.move_stop_loss(ticket, stop_loss).await,
            ExecutionMode::Live => match self.live().await {
                Some(live) => live.move_stop_loss(ticket, stop_loss).await,
                None => Err(BotError::BridgeError(
                    "live account is no longer connected".to_string(),
                )),
            },
        }
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        if let Some(live) = self.live().await {
            match live.quote(symbol).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    warn!("⚠️ 获取 {} 实时报价失败，改用模拟报价: {}", symbol, e);
                    self.record_error(&e).await;
                }
            }
        }
        self.simulator.quote(symbol).await
    }

    async fn status(&self) -> BridgeStatus {
        let mut status = match self.live().await {
            Some(live) => live.status().await,
            None => self.simulator.status().await,
        };
        if status.last_error.is_none() {
            status.last_error = self.last_error.read().await.clone();
        }
        status
    }
}
