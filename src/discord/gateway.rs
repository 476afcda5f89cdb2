/// Discord网关连接 - 心跳保活与自动重连
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval_at, sleep, Duration, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::core::error::{BotError, Result};
use crate::discord::model::{
    GatewayPayload, GuildCreate, GuildMemberAdd, Interaction, PresenceUpdate, Ready,
};

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MEMBERS: u64 = 1 << 1;
pub const INTENT_GUILD_PRESENCES: u64 = 1 << 8;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// 不可恢复的关闭码：认证失败、分片错误、intents非法
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// 网关连接状态
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    Error(String),
}

/// 网关配置
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub intents: u64,
    /// 重连延迟（秒）
    pub reconnect_delay: u64,
    /// 最大连续重连次数
    pub max_reconnect_attempts: u32,
}

impl GatewayConfig {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            url: url.to_string(),
            token: token.to_string(),
            intents: INTENT_GUILDS | INTENT_GUILD_MEMBERS | INTENT_GUILD_PRESENCES,
            reconnect_delay: 5,
            max_reconnect_attempts: 10,
        }
    }
}

/// 业务层关心的网关事件
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Ready),
    GuildCreate(GuildCreate),
    MemberAdd(GuildMemberAdd),
    PresenceUpdate(PresenceUpdate),
    InteractionCreate(Interaction),
}

/// 网关事件处理器trait
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理分发事件
    async fn handle_event(&self, event: GatewayEvent) -> Result<()>;

    /// 处理错误
    async fn handle_error(&self, error: BotError) {
        error!("网关事件处理错误: {}", error);
    }
}

/// 一次会话结束的原因
#[derive(Debug, PartialEq)]
enum SessionEnd {
    Reconnect,
    Closed(Option<u16>),
}

/// 解析分发事件，未关心的事件返回None
pub fn decode_event(event_type: &str, data: Value) -> Result<Option<GatewayEvent>> {
    let event = match event_type {
        "READY" => GatewayEvent::Ready(serde_json::from_value(data)?),
        "GUILD_CREATE" => GatewayEvent::GuildCreate(serde_json::from_value(data)?),
        "GUILD_MEMBER_ADD" => GatewayEvent::MemberAdd(serde_json::from_value(data)?),
        "PRESENCE_UPDATE" => GatewayEvent::PresenceUpdate(serde_json::from_value(data)?),
        "INTERACTION_CREATE" => GatewayEvent::InteractionCreate(serde_json::from_value(data)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Discord网关客户端
pub struct GatewayClient {
    config: GatewayConfig,
    state: Arc<RwLock<ConnectionState>>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// 运行网关直到遇到不可恢复错误
    pub async fn run(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut attempts: u32 = 0;

        loop {
            let started = Instant::now();
            match self.run_session(handler.clone()).await {
                Ok(SessionEnd::Closed(Some(code))) if FATAL_CLOSE_CODES.contains(&code) => {
                    let msg = format!("网关以不可恢复的关闭码结束: {}", code);
                    *self.state.write().await = ConnectionState::Error(msg.clone());
                    return Err(if code == 4004 {
                        BotError::AuthError("Discord token无效".to_string())
                    } else {
                        BotError::GatewayError(msg)
                    });
                }
                Ok(end) => info!("🔚 网关会话结束: {:?}", end),
                Err(e) => warn!("❌ 网关会话异常: {}", e),
            }

            // 稳定运行过一段时间则重置计数
            if started.elapsed() > Duration::from_secs(60) {
                attempts = 0;
            }
            if attempts >= self.config.max_reconnect_attempts {
                error!("❌ 达到最大重连次数: {}", self.config.max_reconnect_attempts);
                *self.state.write().await =
                    ConnectionState::Error("达到最大重连次数".to_string());
                return Err(BotError::GatewayError("达到最大重连次数".to_string()));
            }

            attempts += 1;
            *self.state.write().await = ConnectionState::Reconnecting;
            info!(
                "🔄 尝试重连网关 {}/{}",
                attempts, self.config.max_reconnect_attempts
            );
            sleep(Duration::from_secs(self.config.reconnect_delay)).await;
        }
    }

    async fn run_session(&self, handler: Arc<dyn EventHandler>) -> Result<SessionEnd> {
        *self.state.write().await = ConnectionState::Connecting;
        info!("🔌 正在连接Discord网关: {}", self.config.url);

        let (ws_stream, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| BotError::GatewayError(format!("Connection failed: {}", e)))?;
        let (mut sink, mut stream) = ws_stream.split();

        // 第一条必须是Hello
        let heartbeat_ms = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let payload: GatewayPayload = serde_json::from_str(&text)?;
                    if payload.op == OP_HELLO {
                        break payload
                            .d
                            .as_ref()
                            .and_then(|d| d.get("heartbeat_interval"))
                            .and_then(Value::as_u64)
                            .unwrap_or(41_250);
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BotError::GatewayError(format!("Receive error: {}", e))),
                None => return Ok(SessionEnd::Closed(None)),
            }
        };

        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.config.token,
                "intents": self.config.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "fxsignal",
                    "device": "fxsignal"
                }
            }
        });
        sink.send(Message::Text(identify.to_string()))
            .await
            .map_err(|e| BotError::GatewayError(format!("Send failed: {}", e)))?;

        *self.state.write().await = ConnectionState::Connected;
        info!("✅ 网关已连接，心跳间隔 {}ms", heartbeat_ms);

        let period = Duration::from_millis(heartbeat_ms);
        let mut heartbeat = interval_at(Instant::now() + period, period);
        let mut sequence: Option<u64> = None;
        let mut acked = true;

        let end = loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("💔 未收到心跳ACK，连接可能已失效");
                        break SessionEnd::Reconnect;
                    }
                    acked = false;
                    let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                    trace!("💓 发送心跳 seq={:?}", sequence);
                    if let Err(e) = sink.send(Message::Text(beat.to_string())).await {
                        warn!("心跳发送失败: {}", e);
                        break SessionEnd::Reconnect;
                    }
                }
                message = stream.next() => {
                    let text = match message {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = sink.send(Message::Pong(data)).await {
                                warn!("Pong发送失败: {}", e);
                                break SessionEnd::Reconnect;
                            }
                            continue;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code));
                            info!("🔚 网关关闭: {:?}", code);
                            break SessionEnd::Closed(code);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("❌ 网关接收错误: {}", e);
                            break SessionEnd::Reconnect;
                        }
                        None => break SessionEnd::Closed(None),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("无法解析网关消息: {}", e);
                            continue;
                        }
                    };

                    match payload.op {
                        OP_DISPATCH => {
                            if payload.s.is_some() {
                                sequence = payload.s;
                            }
                            let (Some(event_type), Some(data)) = (payload.t, payload.d) else {
                                continue;
                            };
                            debug!("📥 网关事件: {}", event_type);
                            match decode_event(&event_type, data) {
                                // READY 先于其它事件处理完，保证应用ID已就绪
                                Ok(Some(event @ GatewayEvent::Ready(_))) => {
                                    if let Err(e) = handler.handle_event(event).await {
                                        handler.handle_error(e).await;
                                    }
                                }
                                Ok(Some(event)) => {
                                    let handler = handler.clone();
                                    tokio::spawn(async move {
                                        if let Err(e) = handler.handle_event(event).await {
                                            handler.handle_error(e).await;
                                        }
                                    });
                                }
                                Ok(None) => {}
                                Err(e) => warn!("解析 {} 事件失败: {}", event_type, e),
                            }
                        }
                        OP_HEARTBEAT => {
                            let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                            if let Err(e) = sink.send(Message::Text(beat.to_string())).await {
                                warn!("应答心跳发送失败: {}", e);
                                break SessionEnd::Reconnect;
                            }
                        }
                        OP_HEARTBEAT_ACK => acked = true,
                        OP_RECONNECT => {
                            info!("网关要求重连");
                            break SessionEnd::Reconnect;
                        }
                        OP_INVALID_SESSION => {
                            warn!("网关会话失效，稍后重新鉴权");
                            sleep(Duration::from_secs(2)).await;
                            break SessionEnd::Reconnect;
                        }
                        other => trace!("忽略网关op: {}", other),
                    }
                }
            }
        };

        let _ = sink.close().await;
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intents_cover_members_and_presences() {
        let cfg = GatewayConfig::new("wss://example", "token");
        assert_eq!(cfg.intents, 1 | 2 | 256);
    }

    #[test]
    fn decodes_interaction_event() {
        let data = json!({
            "id": "1", "application_id": "2", "type": 2, "token": "tok",
            "guild_id": "3",
            "data": {"name": "entry", "options": [{"name": "pair", "type": 3, "value": "EURUSD"}]}
        });
        match decode_event("INTERACTION_CREATE", data).unwrap() {
            Some(GatewayEvent::InteractionCreate(i)) => {
                assert_eq!(i.command_name(), Some("entry"));
                assert_eq!(i.guild_id, Some(3));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn ignores_unknown_events() {
        assert!(decode_event("TYPING_START", json!({})).unwrap().is_none());
    }
}
