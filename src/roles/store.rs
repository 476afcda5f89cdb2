//! 试用角色授予记录的持久化
//!
//! 整个文档以 JSON 保存，写入时先写临时文件再 rename 覆盖。
//! 旧版的 `pending_weekend` 表只在加载时读取并迁移到 `grants`，不再写回。

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tokio::task;

use crate::core::error::Result;
use crate::discord::Snowflake;
use crate::roles::schedule::WeekendPolicy;

/// 试用角色开关，和授予记录保存在同一个文件里
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRoleSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub role_id: Option<Snowflake>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// 一次角色授予
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRoleGrant {
    #[serde_as(as = "DisplayFromStr")]
    pub member_id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub guild_id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub role_id: Snowflake,
    pub granted_at: DateTime<Utc>,
    pub weekend_delayed: bool,
    pub activates_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub activation_notified: bool,
}

impl AutoRoleGrant {
    pub fn is_consistent(&self) -> bool {
        self.expires_at >= self.activates_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn needs_activation_notice(&self, now: DateTime<Utc>) -> bool {
        self.weekend_delayed && !self.activation_notified && now >= self.activates_at
    }
}

/// 旧版周末待生效记录
#[serde_as]
#[derive(Debug, Deserialize)]
struct LegacyPending {
    #[serde_as(as = "DisplayFromStr")]
    guild_id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    role_id: Snowflake,
    join_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    settings: TrialRoleSettings,
    #[serde(default)]
    grants: BTreeMap<String, Value>,
    #[serde(default)]
    pending_weekend: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    settings: &'a TrialRoleSettings,
    grants: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct GrantState {
    settings: TrialRoleSettings,
    grants: BTreeMap<Snowflake, AutoRoleGrant>,
    /// 解析失败的原始条目，等待清理
    invalid: BTreeMap<String, Value>,
}

impl GrantState {
    fn from_document(doc: StoredDocument, policy: &WeekendPolicy) -> (Self, usize) {
        let mut state = GrantState {
            settings: doc.settings,
            ..Default::default()
        };

        for (key, raw) in doc.grants {
            let parsed = key.parse::<Snowflake>().ok().and_then(|id| {
                serde_json::from_value::<AutoRoleGrant>(raw.clone())
                    .ok()
                    .map(|g| (id, g))
            });
            match parsed {
                Some((id, grant)) => {
                    state.grants.insert(id, grant);
                }
                None => {
                    state.invalid.insert(key, raw);
                }
            }
        }

        let mut migrated = 0;
        for (key, raw) in doc.pending_weekend {
            let Ok(member_id) = key.parse::<Snowflake>() else {
                warn!("⚠️ 忽略无法识别的旧版周末记录: {}", key);
                continue;
            };
            if state.grants.contains_key(&member_id) {
                continue;
            }
            let legacy: LegacyPending = match serde_json::from_value(raw) {
                Ok(legacy) => legacy,
                Err(e) => {
                    warn!("⚠️ 旧版周末记录 {} 解析失败: {}", key, e);
                    continue;
                }
            };
            let schedule = policy.schedule(legacy.join_time);
            state.grants.insert(
                member_id,
                AutoRoleGrant {
                    member_id,
                    guild_id: legacy.guild_id,
                    role_id: legacy.role_id,
                    granted_at: legacy.join_time,
                    weekend_delayed: schedule.weekend_delayed,
                    activates_at: schedule.activates_at,
                    expires_at: schedule.expires_at,
                    activation_notified: false,
                },
            );
            migrated += 1;
        }

        (state, migrated)
    }

    fn to_json(&self) -> anyhow::Result<String> {
        let mut grants = BTreeMap::new();
        for (id, grant) in &self.grants {
            grants.insert(id.to_string(), serde_json::to_value(grant)?);
        }
        for (key, raw) in &self.invalid {
            grants.entry(key.clone()).or_insert_with(|| raw.clone());
        }
        let doc = DocumentOut {
            settings: &self.settings,
            grants,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

/// 临时文件 + rename 的原子写入
fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("状态文件名非法: {}", path.display()))?;
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

    fs::write(&tmp_path, content)
        .with_context(|| format!("写入临时文件失败: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("替换状态文件失败: {}", path.display()))?;
    Ok(())
}

/// 读取文档；文件损坏时挪到 `<file>.corrupt-<时间戳>` 并返回空文档
fn read_document(path: &Path) -> anyhow::Result<StoredDocument> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoredDocument::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("读取状态文件失败: {}", path.display()))
        }
    };

    match serde_json::from_str::<StoredDocument>(&content) {
        Ok(doc) => Ok(doc),
        Err(parse_err) => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("状态文件名非法: {}", path.display()))?;
            let aside = path.with_file_name(format!(
                "{}.corrupt-{}",
                file_name,
                Utc::now().format("%Y%m%d%H%M%S")
            ));
            fs::rename(path, &aside).with_context(|| {
                format!("移动损坏的状态文件失败: {} -> {}", path.display(), aside.display())
            })?;
            error!(
                "❌ 状态文件损坏 ({}), 已移动到 {}，以空状态启动",
                parse_err,
                aside.display()
            );
            Ok(StoredDocument::default())
        }
    }
}

/// 授予记录存储，写锁在序列化+落盘期间一直持有，保证单写者
pub struct GrantStore {
    path: PathBuf,
    state: RwLock<GrantState>,
}

impl GrantStore {
    pub async fn open(path: impl Into<PathBuf>, policy: &WeekendPolicy) -> Result<Self> {
        let path = path.into();
        let read_path = path.clone();
        let doc = task::spawn_blocking(move || read_document(&read_path))
            .await
            .map_err(|e| anyhow!("读取任务异常: {}", e))??;

        let (state, migrated) = GrantState::from_document(doc, policy);
        info!(
            "✅ 已加载试用角色状态: {} 条记录, {} 条待清理, 迁移旧记录 {} 条",
            state.grants.len(),
            state.invalid.len(),
            migrated
        );

        let store = Self {
            path,
            state: RwLock::new(state),
        };
        if migrated > 0 {
            let state = store.state.write().await;
            store.persist(&state).await?;
            drop(state);
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &GrantState) -> Result<()> {
        let content = state.to_json()?;
        let path = self.path.clone();
        task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .map_err(|e| anyhow!("写入任务异常: {}", e))??;
        Ok(())
    }

    pub async fn settings(&self) -> TrialRoleSettings {
        self.state.read().await.settings.clone()
    }

    pub async fn update_settings<F>(&self, update: F) -> Result<TrialRoleSettings>
    where
        F: FnOnce(&mut TrialRoleSettings),
    {
        let mut state = self.state.write().await;
        update(&mut state.settings);
        self.persist(&state).await?;
        Ok(state.settings.clone())
    }

    pub async fn get(&self, member_id: Snowflake) -> Option<AutoRoleGrant> {
        self.state.read().await.grants.get(&member_id).cloned()
    }

    pub async fn upsert(&self, grant: AutoRoleGrant) -> Result<()> {
        let mut state = self.state.write().await;
        state.grants.insert(grant.member_id, grant);
        self.persist(&state).await
    }

    pub async fn remove(&self, member_id: Snowflake) -> Result<Option<AutoRoleGrant>> {
        let mut state = self.state.write().await;
        let removed = state.grants.remove(&member_id);
        if removed.is_some() {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    pub async fn mark_activation_notified(&self, member_id: Snowflake) -> Result<()> {
        let mut state = self.state.write().await;
        match state.grants.get_mut(&member_id) {
            Some(grant) if !grant.activation_notified => grant.activation_notified = true,
            _ => return Ok(()),
        }
        self.persist(&state).await
    }

    /// 按成员ID排序
    pub async fn list(&self) -> Vec<AutoRoleGrant> {
        self.state.read().await.grants.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.grants.len()
    }

    /// 删除无法解析或时间不一致的记录，返回删除条数
    pub async fn purge_invalid(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.grants.len() + state.invalid.len();

        for key in state.invalid.keys() {
            warn!("🧹 删除无效的授予记录: {}", key);
        }
        state.invalid.clear();
        state.grants.retain(|id, grant| {
            let keep = grant.is_consistent() && grant.member_id == *id;
            if !keep {
                warn!("🧹 删除时间不一致的授予记录: {}", id);
            }
            keep
        });

        let removed = before - state.grants.len();
        if removed > 0 {
            self.persist(&state).await?;
        }
        Ok(removed)
    }
}
