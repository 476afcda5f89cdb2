//! 在线状态缓存，数据来自 GUILD_CREATE 和 PRESENCE_UPDATE

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::discord::model::{PresenceUpdate, Snowflake};

#[derive(Default)]
pub struct PresenceCache {
    /// (guild_id, user_id) -> status
    statuses: RwLock<HashMap<(Snowflake, Snowflake), String>>,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, guild_id: Snowflake, presence: &PresenceUpdate) {
        let mut statuses = self.statuses.write().await;
        if presence.status == "offline" {
            statuses.remove(&(guild_id, presence.user.id));
        } else {
            statuses.insert((guild_id, presence.user.id), presence.status.clone());
        }
    }

    pub async fn load_guild(&self, guild_id: Snowflake, presences: &[PresenceUpdate]) {
        for presence in presences {
            self.update(guild_id, presence).await;
        }
    }

    /// online/idle/dnd 都视为在线，未知成员视为离线
    pub async fn is_online(&self, guild_id: Snowflake, user_id: Snowflake) -> bool {
        self.statuses
            .read()
            .await
            .get(&(guild_id, user_id))
            .map(|s| s != "offline" && s != "invisible")
            .unwrap_or(false)
    }

    pub async fn online_count(&self, guild_id: Snowflake) -> usize {
        self.statuses
            .read()
            .await
            .keys()
            .filter(|(g, _)| *g == guild_id)
            .count()
    }
}
