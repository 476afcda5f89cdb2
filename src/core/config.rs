use crate::core::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 机器人总配置
///
/// 由 `config` crate 从YAML文件加载，再叠加 `FXSIGNAL__` 前缀的环境变量，
/// 例如 `FXSIGNAL__MONITOR__POLL_INTERVAL_SECS=10`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub discord: DiscordConfig,
    pub health: HealthConfig,
    pub monitor: MonitorConfig,
    pub bridge: BridgeConfig,
    pub trial_role: TrialRoleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// 应用ID，缺省时从READY事件中获取
    pub application_id: Option<String>,
    /// 启动时注册命令的重试次数
    pub command_sync_retries: u32,
    pub gateway_url: String,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            application_id: None,
            command_sync_retries: 3,
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
            api_base: "https://discord.com/api/v10".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// 是否允许用模拟器报价驱动TP/SL判定
    pub allow_simulated_prices: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 5,
            allow_simulated_prices: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    /// MetaApi区域，例如 new-york / london
    pub region: String,
    pub lot_size: f64,
    pub request_timeout_secs: u64,
    /// 信号品种 -> 券商品种
    pub symbol_map: HashMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            region: "new-york".to_string(),
            lot_size: 0.01,
            request_timeout_secs: 30,
            symbol_map: HashMap::from([
                ("US100".to_string(), "NAS100".to_string()),
                ("US500".to_string(), "SPX500".to_string()),
                ("GER40".to_string(), "DE40".to_string()),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialRoleConfig {
    pub state_file: String,
    pub duration_hours: i64,
    pub expiry_sweep_minutes: u64,
    pub activation_sweep_minutes: u64,
    /// 休市窗口所用的固定时区偏移（小时）
    pub utc_offset_hours: i32,
}

impl Default for TrialRoleConfig {
    fn default() -> Self {
        Self {
            state_file: "data/auto_roles.json".to_string(),
            duration_hours: 24,
            expiry_sweep_minutes: 15,
            activation_sweep_minutes: 30,
            utc_offset_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    /// 为空时只输出到控制台
    pub file_dir: Option<String>,
    pub max_file_size_mb: u64,
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_output: true,
            file_dir: Some("logs".to_string()),
            max_file_size_mb: 10,
            max_files: 5,
        }
    }
}

impl BotConfig {
    /// 从YAML文件和环境变量加载配置
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("FXSIGNAL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: BotConfig = settings.try_deserialize()?;

        // 平台约定的PORT优先
        if let Ok(port) = std::env::var("PORT") {
            cfg.health.port = port
                .parse()
                .map_err(|_| BotError::ConfigError(format!("PORT 不是合法端口: {}", port)))?;
        }

        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// config crate 会把键名转成小写，这里把品种映射还原成大写
    fn normalize(&mut self) {
        self.bridge.symbol_map = self
            .bridge
            .symbol_map
            .drain()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        self.logging.level = self.logging.level.to_uppercase();
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_secs == 0 {
            return Err(BotError::validation("monitor.poll_interval_secs", "必须大于0"));
        }
        if self.trial_role.duration_hours <= 0 {
            return Err(BotError::validation("trial_role.duration_hours", "必须大于0"));
        }
        if self.trial_role.expiry_sweep_minutes == 0
            || self.trial_role.activation_sweep_minutes == 0
        {
            return Err(BotError::validation("trial_role.*_sweep_minutes", "必须大于0"));
        }
        if !(-14..=14).contains(&self.trial_role.utc_offset_hours) {
            return Err(BotError::validation(
                "trial_role.utc_offset_hours",
                "必须在 -14..=14 之间",
            ));
        }
        if !(self.bridge.lot_size > 0.0) {
            return Err(BotError::validation("bridge.lot_size", "必须为正数"));
        }
        check_url("discord.api_base", &self.discord.api_base, &["https", "http"])?;
        check_url("discord.gateway_url", &self.discord.gateway_url, &["wss", "ws"])?;
        Ok(())
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| BotError::validation(field, format!("不是合法URL: {}", e)))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(BotError::validation(
            field,
            format!("协议必须是 {}", schemes.join("/")),
        ));
    }
    Ok(())
}

/// 密钥配置，只从环境变量读取
#[derive(Clone)]
pub struct Secrets {
    pub discord_token: String,
    pub metaapi_token: Option<String>,
    pub metaapi_account_id: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // 加载.env文件，忽略错误

        let discord_token = std::env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BotError::ConfigError("未找到DISCORD_TOKEN环境变量".to_string()))?;

        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            discord_token,
            metaapi_token: non_empty("METAAPI_TOKEN"),
            metaapi_account_id: non_empty("METAAPI_ACCOUNT_ID"),
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("discord_token", &"***")
            .field("metaapi_token", &self.metaapi_token.as_ref().map(|_| "***"))
            .field("metaapi_account_id", &self.metaapi_account_id)
            .finish()
    }
}
