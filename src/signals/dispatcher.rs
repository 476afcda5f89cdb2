//! 信号分发：频道解析 + 多频道发送
//!
//! 解析结果以值的形式返回，单个频道失败不影响其它频道。

use log::{info, warn};
use std::sync::Arc;

use crate::core::error::BotError;
use crate::discord::model::{Channel, Role};
use crate::discord::{DiscordApi, Snowflake};

/// 用户输入的频道标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// `<#123>`
    Mention(Snowflake),
    /// 纯数字ID
    Id(Snowflake),
    /// 频道名（已去掉前导 `#`）
    Name(String),
}

impl ChannelRef {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        if let Some(inner) = token.strip_prefix("<#").and_then(|t| t.strip_suffix('>')) {
            if let Ok(id) = inner.parse() {
                return Some(ChannelRef::Mention(id));
            }
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = token.parse() {
                return Some(ChannelRef::Id(id));
            }
        }
        let name = token.trim_start_matches('#').trim();
        if name.is_empty() {
            return None;
        }
        Some(ChannelRef::Name(name.to_string()))
    }

    fn label(&self) -> String {
        match self {
            ChannelRef::Mention(id) => format!("<#{}>", id),
            ChannelRef::Id(id) => id.to_string(),
            ChannelRef::Name(name) => format!("#{}", name),
        }
    }
}

/// 逗号分隔的频道列表，空项跳过
pub fn parse_channel_list(input: &str) -> Vec<ChannelRef> {
    input.split(',').filter_map(ChannelRef::parse).collect()
}

/// 发送失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub target: String,
    pub reason: String,
}

/// 单个标识的解析结果
pub type ChannelTarget = std::result::Result<Channel, DeliveryFailure>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredTo {
    pub channel_id: Snowflake,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<DeliveredTo>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn channel_ids(&self) -> Vec<Snowflake> {
        self.delivered.iter().map(|d| d.channel_id).collect()
    }

    /// 给命令发起者的汇总文本，`what` 例如 "Signal" / "Stats"
    pub fn summary(&self, what: &str) -> String {
        let mut lines = Vec::new();
        if self.delivered.is_empty() {
            lines.push("❌ No valid channels found or no messages sent.".to_string());
        } else {
            let names: Vec<&str> = self.delivered.iter().map(|d| d.name.as_str()).collect();
            lines.push(format!("✅ {} sent to: {}", what, names.join(", ")));
        }
        for failure in &self.failed {
            lines.push(format!("❌ {}: {}", failure.target, failure.reason));
        }
        lines.join("\n")
    }
}

fn failure_reason(error: &BotError) -> String {
    match error {
        BotError::PermissionError(_) => "no permission".to_string(),
        BotError::NotFound(_) => "not found".to_string(),
        other => other.to_string(),
    }
}

/// 把角色名列表渲染成提及文本
///
/// `everyone` / `@everyone` 不区分大小写统一为 `@everyone`，
/// 匹配到服务器角色的输出 `<@&id>`，其余原样输出。
pub fn render_mentions(input: &str, roles: &[Role]) -> String {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let lower = name.to_lowercase();
            if lower == "everyone" || lower == "@everyone" {
                "@everyone".to_string()
            } else if let Some(role) = roles.iter().find(|r| r.name == name) {
                role.mention()
            } else {
                name.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn needs_role_lookup(input: &str) -> bool {
    input.split(',').map(str::trim).any(|name| {
        let lower = name.to_lowercase();
        !name.is_empty() && lower != "everyone" && lower != "@everyone"
    })
}

pub struct SignalDispatcher {
    api: Arc<dyn DiscordApi>,
}

impl SignalDispatcher {
    pub fn new(api: Arc<dyn DiscordApi>) -> Self {
        Self { api }
    }

    /// 解析每个频道标识，顺序与输入一致
    pub async fn resolve(&self, guild_id: Snowflake, input: &str) -> Vec<ChannelTarget> {
        let refs = parse_channel_list(input);
        let mut guild_channels: Option<Vec<Channel>> = None;
        let mut targets = Vec::with_capacity(refs.len());

        for channel_ref in refs {
            let label = channel_ref.label();
            let fail = |reason: &str| DeliveryFailure {
                target: label.clone(),
                reason: reason.to_string(),
            };

            let target = match &channel_ref {
                ChannelRef::Mention(id) | ChannelRef::Id(id) => {
                    match self.api.get_channel(*id).await {
                        Ok(channel) if channel.guild_id.map_or(false, |g| g != guild_id) => {
                            Err(fail("not in this server"))
                        }
                        Ok(channel) if !channel.is_text() => Err(fail("not a text channel")),
                        Ok(channel) => Ok(channel),
                        Err(e) => Err(fail(&failure_reason(&e))),
                    }
                }
                ChannelRef::Name(name) => {
                    if guild_channels.is_none() {
                        match self.api.guild_channels(guild_id).await {
                            Ok(channels) => guild_channels = Some(channels),
                            Err(e) => {
                                targets.push(Err(fail(&failure_reason(&e))));
                                continue;
                            }
                        }
                    }
                    let channels = guild_channels.as_deref().unwrap_or_default();
                    let named: Vec<&Channel> = channels
                        .iter()
                        .filter(|c| c.name.as_deref() == Some(name.as_str()))
                        .collect();

                    // 重名时取服务器顺序中的第一个文字频道
                    match named.iter().find(|c| c.is_text()) {
                        Some(channel) => Ok((*channel).clone()),
                        None if !named.is_empty() => Err(fail("not a text channel")),
                        None => Err(fail("not found")),
                    }
                }
            };
            targets.push(target);
        }
        targets
    }

    /// 解析并发送到所有频道
    pub async fn broadcast(
        &self,
        guild_id: Snowflake,
        channels: &str,
        content: &str,
    ) -> DeliveryReport {
        let targets = self.resolve(guild_id, channels).await;
        let mut report = DeliveryReport::default();
        let mut seen = Vec::new();

        for target in targets {
            match target {
                Ok(channel) => {
                    if seen.contains(&channel.id) {
                        continue;
                    }
                    seen.push(channel.id);
                    self.send_one(&channel, content, &mut report).await;
                }
                Err(failure) => report.failed.push(failure),
            }
        }

        info!(
            "📤 广播完成: 成功 {} 个频道, 失败 {} 个",
            report.delivered.len(),
            report.failed.len()
        );
        report
    }

    /// 发送到已知频道ID（跟进消息用）
    pub async fn post_to_ids(&self, channel_ids: &[Snowflake], content: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for &channel_id in channel_ids {
            match self.api.send_message(channel_id, content).await {
                Ok(_) => report.delivered.push(DeliveredTo {
                    channel_id,
                    name: channel_id.to_string(),
                }),
                Err(e) => {
                    warn!("⚠️ 发送到频道 {} 失败: {}", channel_id, e);
                    report.failed.push(DeliveryFailure {
                        target: format!("<#{}>", channel_id),
                        reason: failure_reason(&e),
                    });
                }
            }
        }
        report
    }

    /// 渲染角色提及；只有出现普通角色名时才请求角色列表
    pub async fn mentions(&self, guild_id: Snowflake, roles: &str) -> String {
        if !needs_role_lookup(roles) {
            return render_mentions(roles, &[]);
        }
        match self.api.guild_roles(guild_id).await {
            Ok(guild_roles) => render_mentions(roles, &guild_roles),
            Err(e) => {
                warn!("⚠️ 获取角色列表失败，按原文输出提及: {}", e);
                render_mentions(roles, &[])
            }
        }
    }

    async fn send_one(&self, channel: &Channel, content: &str, report: &mut DeliveryReport) {
        let name = channel.display_name();
        match self.api.send_message(channel.id, content).await {
            Ok(_) => report.delivered.push(DeliveredTo {
                channel_id: channel.id,
                name,
            }),
            Err(e) => {
                warn!("⚠️ 发送到 #{} 失败: {}", name, e);
                report.failed.push(DeliveryFailure {
                    target: format!("#{}", name),
                    reason: failure_reason(&e),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_identifier_form() {
        let refs = parse_channel_list("<#123>, 456 ,#signals, vip-room,,  ");
        assert_eq!(
            refs,
            vec![
                ChannelRef::Mention(123),
                ChannelRef::Id(456),
                ChannelRef::Name("signals".into()),
                ChannelRef::Name("vip-room".into()),
            ]
        );
    }

    #[test]
    fn mention_rendering() {
        let roles = vec![Role {
            id: 42,
            name: "VIP".into(),
            position: 1,
        }];
        assert_eq!(
            render_mentions("Everyone, VIP, Traders, @EVERYONE", &roles),
            "@everyone <@&42> Traders @everyone"
        );
        assert_eq!(render_mentions(" , ", &roles), "");
    }

    #[test]
    fn summary_lists_failures() {
        let report = DeliveryReport {
            delivered: vec![DeliveredTo {
                channel_id: 1,
                name: "signals".into(),
            }],
            failed: vec![DeliveryFailure {
                target: "#vip".into(),
                reason: "no permission".into(),
            }],
        };
        assert_eq!(
            report.summary("Signal"),
            "✅ Signal sent to: signals\n❌ #vip: no permission"
        );
        assert!(DeliveryReport::default()
            .summary("Stats")
            .starts_with("❌ No valid channels"));
    }
}
