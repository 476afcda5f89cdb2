//! 机器人上下文与网关事件处理

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::bridge::{FallbackBridge, TradeBridge};
use crate::commands::{self, CommandRouter};
use crate::core::config::BotConfig;
use crate::core::error::Result;
use crate::core::health::BotStatus;
use crate::core::retry_policy::ExponentialBackoffRetry;
use crate::discord::{DiscordApi, EventHandler, GatewayEvent, PresenceCache, Snowflake};
use crate::roles::{GrantStore, RoleScheduler, WeekendPolicy};
use crate::signals::{SignalDispatcher, SignalMonitor, SignalStore};

/// 所有命令和后台任务共享的依赖
#[derive(Clone)]
pub struct BotContext {
    pub config: Arc<BotConfig>,
    pub api: Arc<dyn DiscordApi>,
    pub signals: Arc<SignalStore>,
    pub dispatcher: Arc<SignalDispatcher>,
    pub bridge: Arc<FallbackBridge>,
    pub monitor: Arc<SignalMonitor>,
    pub roles: Arc<RoleScheduler>,
    pub presence: Arc<PresenceCache>,
    pub status: Arc<BotStatus>,
}

impl BotContext {
    pub fn builder() -> BotContextBuilder {
        BotContextBuilder::default()
    }
}

/// 构建 `BotContext`，未提供的可选依赖使用默认实现
#[derive(Default)]
pub struct BotContextBuilder {
    config: Option<BotConfig>,
    api: Option<Arc<dyn DiscordApi>>,
    grants: Option<Arc<GrantStore>>,
    bridge: Option<Arc<FallbackBridge>>,
    presence: Option<Arc<PresenceCache>>,
    status: Option<Arc<BotStatus>>,
}

impl BotContextBuilder {
    pub fn with_config(mut self, config: BotConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_api(mut self, api: Arc<dyn DiscordApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_grant_store(mut self, grants: Arc<GrantStore>) -> Self {
        self.grants = Some(grants);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<FallbackBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_presence(mut self, presence: Arc<PresenceCache>) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn with_status(mut self, status: Arc<BotStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> anyhow::Result<BotContext> {
        let config = self.config.ok_or_else(|| anyhow!("BotContext 缺少 config"))?;
        let api = self.api.ok_or_else(|| anyhow!("BotContext 缺少 api"))?;
        let grants = self
            .grants
            .ok_or_else(|| anyhow!("BotContext 缺少 grant_store"))?;

        let bridge = self
            .bridge
            .unwrap_or_else(|| Arc::new(FallbackBridge::new(config.bridge.clone(), None)));
        let signals = Arc::new(SignalStore::new());
        let dispatcher = Arc::new(SignalDispatcher::new(Arc::clone(&api)));
        let monitor = Arc::new(SignalMonitor::new(
            Arc::clone(&signals),
            Arc::clone(&bridge) as Arc<dyn TradeBridge>,
            Arc::clone(&dispatcher),
            config.monitor.clone(),
        ));
        let roles = Arc::new(RoleScheduler::new(
            Arc::clone(&api),
            grants,
            WeekendPolicy::from_config(&config.trial_role),
        ));

        Ok(BotContext {
            config: Arc::new(config),
            api,
            signals,
            dispatcher,
            bridge,
            monitor,
            roles,
            presence: self.presence.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
        })
    }
}

/// 网关事件入口
pub struct Bot {
    ctx: BotContext,
    router: CommandRouter,
    application_id: RwLock<Option<Snowflake>>,
    /// 已注册（或正在注册）命令的服务器
    registered: Arc<Mutex<HashSet<Snowflake>>>,
}

impl Bot {
    pub fn new(ctx: BotContext) -> Self {
        let application_id = ctx
            .config
            .discord
            .application_id
            .as_deref()
            .and_then(|id| id.trim().parse().ok());
        Self {
            router: CommandRouter::new(ctx.clone()),
            ctx,
            application_id: RwLock::new(application_id),
            registered: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// 后台注册命令，已注册过的服务器直接跳过
    async fn sync_commands(&self, guild_id: Snowflake) {
        let Some(application_id) = *self.application_id.read().await else {
            debug!("应用ID未知，暂不注册服务器 {} 的命令", guild_id);
            return;
        };
        if !self.registered.lock().await.insert(guild_id) {
            return;
        }

        let api = Arc::clone(&self.ctx.api);
        let registered = Arc::clone(&self.registered);
        let retry = ExponentialBackoffRetry::default()
            .with_max_retries(self.ctx.config.discord.command_sync_retries);
        tokio::spawn(async move {
            let definitions = commands::definitions();
            let result = retry
                .execute_with_retry(|| {
                    api.register_guild_commands(application_id, guild_id, &definitions)
                })
                .await;
            match result {
                Ok(()) => info!("✅ 已注册 {} 个命令到服务器 {}", definitions.len(), guild_id),
                Err(e) => {
                    warn!("❌ 服务器 {} 命令注册失败: {}", guild_id, e);
                    registered.lock().await.remove(&guild_id);
                }
            }
        });
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn handle_event(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::Ready(ready) => {
                let tag = ready.user.tag();
                info!("🤖 已登录: {} (服务器 {} 个)", tag, ready.guilds.len());
                self.ctx.status.set_connected(&tag);
                {
                    let mut app_id = self.application_id.write().await;
                    if app_id.is_none() {
                        *app_id = Some(ready.application.id);
                    }
                }
                for guild in &ready.guilds {
                    self.sync_commands(guild.id).await;
                }
            }
            GatewayEvent::GuildCreate(guild) => {
                self.ctx.presence.load_guild(guild.id, &guild.presences).await;
                debug!(
                    "🏠 服务器可用: {} ({}), 在线 {}",
                    guild.name.as_deref().unwrap_or("?"),
                    guild.id,
                    self.ctx.presence.online_count(guild.id).await
                );
                self.sync_commands(guild.id).await;
            }
            GatewayEvent::MemberAdd(added) => {
                self.ctx
                    .roles
                    .on_member_join(added.guild_id, &added.member, Utc::now())
                    .await?;
            }
            GatewayEvent::PresenceUpdate(presence) => {
                if let Some(guild_id) = presence.guild_id {
                    self.ctx.presence.update(guild_id, &presence).await;
                }
            }
            GatewayEvent::InteractionCreate(interaction) => {
                self.router.handle(&interaction).await?;
            }
        }
        Ok(())
    }
}
