//! `/trial_role`：开关试用角色并查看当前授予

use chrono::{DateTime, Utc};
use log::info;

use crate::bot::BotContext;
use crate::commands::options::CommandOptions;
use crate::core::error::{BotError, Result};
use crate::discord::Snowflake;
use crate::roles::{AutoRoleGrant, TrialRoleSettings};

/// 列表最多展示的条数，避免超过消息长度限制
const LIST_LIMIT: usize = 20;

fn ts(at: DateTime<Utc>, style: char) -> String {
    format!("<t:{}:{}>", at.timestamp(), style)
}

fn describe_grant(grant: &AutoRoleGrant, now: DateTime<Utc>) -> String {
    let state = if now < grant.activates_at {
        format!("starts {}", ts(grant.activates_at, 'R'))
    } else {
        format!("expires {}", ts(grant.expires_at, 'R'))
    };
    format!(
        "• <@{}>: granted {}, {}{}",
        grant.member_id,
        ts(grant.granted_at, 'f'),
        state,
        if grant.weekend_delayed { " (weekend delay)" } else { "" }
    )
}

pub fn status_message(settings: &TrialRoleSettings, active: usize, duration_hours: i64) -> String {
    let role = settings
        .role_id
        .map(|id| format!("<@&{}>", id))
        .unwrap_or_else(|| "not set".to_string());
    format!(
        "**Trial role:** {}\nRole: {}\nDuration: {} hours\nTracked members: {}",
        if settings.enabled { "✅ enabled" } else { "❌ disabled" },
        role,
        duration_hours,
        active
    )
}

pub fn list_message(grants: &[AutoRoleGrant], now: DateTime<Utc>) -> String {
    if grants.is_empty() {
        return "No members currently have a trial role.".to_string();
    }
    let mut lines = vec![format!("**Trial role members ({})**", grants.len())];
    lines.extend(grants.iter().take(LIST_LIMIT).map(|g| describe_grant(g, now)));
    if grants.len() > LIST_LIMIT {
        lines.push(format!("… and {} more", grants.len() - LIST_LIMIT));
    }
    lines.join("\n")
}

pub async fn handle(
    ctx: &BotContext,
    guild_id: Snowflake,
    opts: &CommandOptions<'_>,
) -> Result<String> {
    let action = opts.required_string("action")?.to_lowercase();
    let store = ctx.roles.store();
    let duration_hours = ctx.roles.policy().duration().num_hours();

    match action.as_str() {
        "enable" => {
            let role_id = opts.required_snowflake("role")?;
            store
                .update_settings(|s| {
                    s.enabled = true;
                    s.role_id = Some(role_id);
                    s.guild_id = Some(guild_id);
                })
                .await?;
            info!("✅ 试用角色已启用: guild={} role={}", guild_id, role_id);
            Ok(format!(
                "✅ Trial role enabled: new members get <@&{}> for {} hours.",
                role_id, duration_hours
            ))
        }
        "disable" => {
            store.update_settings(|s| s.enabled = false).await?;
            info!("⏸️ 试用角色已停用: guild={}", guild_id);
            Ok("⏸️ Trial role disabled. Existing grants still expire on schedule.".to_string())
        }
        "status" => Ok(status_message(&store.settings().await, store.len().await, duration_hours)),
        "list" => Ok(list_message(&store.list().await, Utc::now())),
        other => Err(BotError::validation(
            "action",
            format!("unknown action `{}`", other),
        )),
    }
}
