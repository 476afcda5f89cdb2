//! 试用角色调度：成员加入授予，定时到期回收和周末生效通知

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::error::{BotError, Result};
use crate::discord::model::Member;
use crate::discord::{DiscordApi, Snowflake};
use crate::roles::schedule::WeekendPolicy;
use crate::roles::store::{AutoRoleGrant, GrantStore};

/// 一次到期扫描的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub revoked: Vec<Snowflake>,
    /// 网络等可重试错误，下次扫描再处理
    pub deferred: Vec<Snowflake>,
    /// 权限或认证错误，记录保留，等待管理员处理
    pub failed: Vec<Snowflake>,
    pub purged: usize,
}

fn discord_time(at: DateTime<Utc>) -> String {
    format!("<t:{}:F>", at.timestamp())
}

fn relative_time(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

pub struct RoleScheduler {
    api: Arc<dyn DiscordApi>,
    store: Arc<GrantStore>,
    policy: WeekendPolicy,
}

impl RoleScheduler {
    pub fn new(api: Arc<dyn DiscordApi>, store: Arc<GrantStore>, policy: WeekendPolicy) -> Self {
        Self { api, store, policy }
    }

    pub fn store(&self) -> &Arc<GrantStore> {
        &self.store
    }

    pub fn policy(&self) -> &WeekendPolicy {
        &self.policy
    }

    fn duration_hours(&self) -> i64 {
        self.policy.duration().num_hours()
    }

    /// 成员加入：功能开启且配置了角色时立即授予并记录
    pub async fn on_member_join(
        &self,
        guild_id: Snowflake,
        member: &Member,
        now: DateTime<Utc>,
    ) -> Result<Option<AutoRoleGrant>> {
        let settings = self.store.settings().await;
        let Some(role_id) = settings.role_id.filter(|_| settings.enabled) else {
            return Ok(None);
        };
        if settings.guild_id.map_or(false, |g| g != guild_id) {
            return Ok(None);
        }
        let Some(user) = member.user.as_ref() else {
            return Ok(None);
        };
        if user.bot {
            return Ok(None);
        }

        self.api.add_member_role(guild_id, user.id, role_id).await?;

        let schedule = self.policy.schedule(now);
        let grant = AutoRoleGrant {
            member_id: user.id,
            guild_id,
            role_id,
            granted_at: now,
            weekend_delayed: schedule.weekend_delayed,
            activates_at: schedule.activates_at,
            expires_at: schedule.expires_at,
            activation_notified: false,
        };
        self.store.upsert(grant.clone()).await?;

        info!(
            "✅ 已授予试用角色: {} ({}), 生效 {}, 到期 {}{}",
            user.tag(),
            user.id,
            grant.activates_at,
            grant.expires_at,
            if grant.weekend_delayed { " [周末延后]" } else { "" }
        );

        let message = if grant.weekend_delayed {
            format!(
                "👋 Welcome! You joined while the market is closed, so your {}-hour trial access \
                 starts {} and ends {}. Feel free to look around until then.",
                self.duration_hours(),
                discord_time(grant.activates_at),
                discord_time(grant.expires_at)
            )
        } else {
            format!(
                "👋 Welcome! Your {}-hour trial access is active now and ends {} ({}).",
                self.duration_hours(),
                discord_time(grant.expires_at),
                relative_time(grant.expires_at)
            )
        };
        self.notify(user.id, &message).await;

        Ok(Some(grant))
    }

    /// 回收所有到期的授予；时间未到的记录不会被处理
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport {
            purged: self.store.purge_invalid().await?,
            ..Default::default()
        };

        for grant in self.store.list().await {
            if !grant.is_expired(now) {
                continue;
            }

            match self
                .api
                .remove_member_role(grant.guild_id, grant.member_id, grant.role_id)
                .await
            {
                Ok(()) => {
                    info!("⌛ 试用角色已到期回收: {}", grant.member_id);
                    self.notify(
                        grant.member_id,
                        "⌛ Your trial access has ended. Thanks for trying our signals!",
                    )
                    .await;
                }
                Err(e) if e.is_retryable() => {
                    warn!("⚠️ 回收 {} 的角色失败，稍后重试: {}", grant.member_id, e);
                    report.deferred.push(grant.member_id);
                    continue;
                }
                Err(BotError::NotFound(_)) => {
                    info!("成员 {} 已离开服务器，删除记录", grant.member_id);
                }
                Err(e) => {
                    error!("❌ 回收 {} 的角色失败，保留记录: {}", grant.member_id, e);
                    report.failed.push(grant.member_id);
                    continue;
                }
            }

            self.store.remove(grant.member_id).await?;
            report.revoked.push(grant.member_id);
        }

        if !report.revoked.is_empty() || !report.failed.is_empty() || report.purged > 0 {
            info!(
                "🧹 到期扫描完成: 回收 {} 个, 延后 {} 个, 失败 {} 个, 清理无效 {} 条",
                report.revoked.len(),
                report.deferred.len(),
                report.failed.len(),
                report.purged
            );
        }
        Ok(report)
    }

    /// 周末延后的授予到达生效时间时发一次通知
    pub async fn sweep_activations(&self, now: DateTime<Utc>) -> Result<Vec<Snowflake>> {
        let mut notified = Vec::new();
        for grant in self.store.list().await {
            if !grant.needs_activation_notice(now) {
                continue;
            }
            self.notify(
                grant.member_id,
                &format!(
                    "🔔 Your trial access is now active and ends {} ({}).",
                    discord_time(grant.expires_at),
                    relative_time(grant.expires_at)
                ),
            )
            .await;
            // 私信失败也只尝试一次
            self.store.mark_activation_notified(grant.member_id).await?;
            notified.push(grant.member_id);
        }
        if !notified.is_empty() {
            info!("🔔 已发送 {} 条试用生效通知", notified.len());
        }
        Ok(notified)
    }

    async fn notify(&self, member_id: Snowflake, content: &str) {
        if let Err(e) = self.api.send_dm(member_id, content).await {
            debug!("无法私信成员 {}: {}", member_id, e);
        }
    }

    /// 启动两个定时扫描任务
    pub fn spawn_sweeps(
        self: &Arc<Self>,
        expiry_every: Duration,
        activation_every: Duration,
    ) -> Vec<JoinHandle<()>> {
        let expiry = {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(expiry_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.sweep_expired(Utc::now()).await {
                        error!("❌ 到期扫描失败: {}", e);
                    }
                }
            })
        };

        let activation = {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(activation_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.sweep_activations(Utc::now()).await {
                        error!("❌ 生效通知扫描失败: {}", e);
                    }
                }
            })
        };

        info!(
            "🔄 试用角色扫描已启动: 到期每 {} 分钟, 生效通知每 {} 分钟",
            expiry_every.as_secs() / 60,
            activation_every.as_secs() / 60
        );
        vec![expiry, activation]
    }
}
