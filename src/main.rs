use anyhow::Context;
use clap::{Arg, Command};
use fxsignal::{
    bot::{Bot, BotContext},
    bridge::FallbackBridge,
    core::{BotConfig, BotStatus, HealthServer, Secrets},
    discord::{DiscordApi, DiscordHttp, GatewayClient, GatewayConfig},
    roles::{GrantStore, WeekendPolicy},
    utils::init_logger,
};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONFIG: &str = "config/bot.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    let matches = Command::new("fxsignal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Discord外汇信号机器人")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value(DEFAULT_CONFIG),
        )
        .get_matches();
    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);

    let config = BotConfig::load(config_file)
        .with_context(|| format!("加载配置失败: {}", config_file))?;
    init_logger(&config.logging)?;
    info!("🚀 启动 fxsignal, 配置文件: {}", config_file);

    let secrets = Secrets::from_env()?;

    let api: Arc<dyn DiscordApi> = Arc::new(DiscordHttp::new(
        &config.discord.api_base,
        &secrets.discord_token,
    )?);

    let policy = WeekendPolicy::from_config(&config.trial_role);
    let grants = Arc::new(
        GrantStore::open(&config.trial_role.state_file, &policy)
            .await
            .context("加载试用角色状态失败")?,
    );
    info!(
        "📂 试用角色记录: {} 条 ({})",
        grants.len().await,
        grants.path().display()
    );

    let bridge = Arc::new(FallbackBridge::new(
        config.bridge.clone(),
        secrets.metaapi_token.clone(),
    ));
    if bridge.settings().enabled {
        match &secrets.metaapi_account_id {
            Some(account_id) => {
                if let Err(e) = bridge.configure_live(account_id, None).await {
                    warn!("⚠️ 实盘账户连接失败，下单将使用模拟模式: {}", e);
                }
            }
            None => info!("ℹ️ 未配置METAAPI_ACCOUNT_ID，下单使用模拟模式"),
        }
    }

    let status = Arc::new(BotStatus::new());
    let ctx = BotContext::builder()
        .with_config(config.clone())
        .with_api(api)
        .with_grant_store(grants)
        .with_bridge(bridge)
        .with_status(Arc::clone(&status))
        .build()?;

    if config.health.enabled {
        let server =
            HealthServer::new(&config.health.bind, config.health.port, Arc::clone(&status))?;
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("❌ 健康检查服务退出: {}", e);
            }
        });
    }

    let sweeps = ctx.roles.spawn_sweeps(
        Duration::from_secs(config.trial_role.expiry_sweep_minutes * 60),
        Duration::from_secs(config.trial_role.activation_sweep_minutes * 60),
    );

    let gateway = GatewayClient::new(GatewayConfig::new(
        &config.discord.gateway_url,
        &secrets.discord_token,
    ));
    let bot = Arc::new(Bot::new(ctx));

    let outcome = tokio::select! {
        result = gateway.run(bot) => result.context("Discord网关已停止"),
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 收到退出信号，正在关闭...");
            Ok(())
        }
    };

    status.set_disconnected();
    for handle in sweeps {
        handle.abort();
    }
    info!("👋 fxsignal 已退出");
    outcome
}
