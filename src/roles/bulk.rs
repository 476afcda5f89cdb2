//! `/bulk_role`：按在线状态批量授予角色

use log::{info, warn};
use std::str::FromStr;

use crate::core::error::{BotError, Result};
use crate::discord::model::Member;
use crate::discord::{DiscordApi, PresenceCache, Snowflake};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceFilter {
    Online,
    Offline,
    Both,
}

impl PresenceFilter {
    pub fn accepts(&self, online: bool) -> bool {
        match self {
            PresenceFilter::Online => online,
            PresenceFilter::Offline => !online,
            PresenceFilter::Both => true,
        }
    }
}

impl FromStr for PresenceFilter {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(PresenceFilter::Online),
            "offline" => Ok(PresenceFilter::Offline),
            "both" => Ok(PresenceFilter::Both),
            other => Err(BotError::validation(
                "filter",
                format!("expected online, offline or both, got `{}`", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRoleRequest {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
    pub filter: PresenceFilter,
    /// 只处理拥有该角色的成员
    pub include_role: Option<Snowflake>,
    /// 跳过拥有该角色的成员
    pub exclude_role: Option<Snowflake>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRoleReport {
    pub added: usize,
    pub already_had: usize,
    pub skipped: usize,
    pub failed: Vec<(Snowflake, String)>,
}

impl BulkRoleReport {
    pub fn summary(&self, role_mention: &str) -> String {
        let mut lines = vec![
            format!("✅ Added {} to **{}** members", role_mention, self.added),
            format!("• Already had the role: {}", self.already_had),
            format!("• Skipped by filters: {}", self.skipped),
        ];
        if !self.failed.is_empty() {
            lines.push(format!("❌ Failed: {}", self.failed.len()));
            for (user_id, reason) in self.failed.iter().take(10) {
                lines.push(format!("  <@{}>: {}", user_id, reason));
            }
        }
        lines.join("\n")
    }
}

/// 成员是否满足筛选条件（不含"已拥有"判断）
pub fn member_matches(member: &Member, online: bool, request: &BulkRoleRequest) -> bool {
    if member.user.as_ref().map_or(true, |u| u.bot) {
        return false;
    }
    if !request.filter.accepts(online) {
        return false;
    }
    if let Some(include) = request.include_role {
        if !member.has_role(include) {
            return false;
        }
    }
    if let Some(exclude) = request.exclude_role {
        if member.has_role(exclude) {
            return false;
        }
    }
    true
}

pub async fn assign_bulk_role(
    api: &dyn DiscordApi,
    presence: &PresenceCache,
    request: &BulkRoleRequest,
) -> Result<BulkRoleReport> {
    let members = api.guild_members(request.guild_id).await?;
    let mut report = BulkRoleReport::default();

    for member in &members {
        let Some(user_id) = member.user_id() else {
            continue;
        };
        let online = presence.is_online(request.guild_id, user_id).await;
        if !member_matches(member, online, request) {
            report.skipped += 1;
            continue;
        }
        if member.has_role(request.role_id) {
            report.already_had += 1;
            continue;
        }

        match api
            .add_member_role(request.guild_id, user_id, request.role_id)
            .await
        {
            Ok(()) => report.added += 1,
            Err(e) => {
                warn!("⚠️ 给 {} 添加角色失败: {}", user_id, e);
                let reason = match &e {
                    BotError::PermissionError(_) => {
                        "no permission (check role hierarchy)".to_string()
                    }
                    other => other.to_string(),
                };
                report.failed.push((user_id, reason));
            }
        }
    }

    info!(
        "✅ 批量授予完成: 新增 {}, 已有 {}, 跳过 {}, 失败 {}",
        report.added,
        report.already_had,
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}
