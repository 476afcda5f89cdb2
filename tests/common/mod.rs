//! 集成测试共用的内存版 Discord API

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use fxsignal::bot::BotContext;
use fxsignal::bridge::{FallbackBridge, SimulatedBridge};
use fxsignal::core::config::BotConfig;
use fxsignal::core::error::{BotError, Result};
use fxsignal::discord::model::{
    ApplicationCommand, Channel, InteractionResponse, Member, Message, Role, User,
};
use fxsignal::discord::{DiscordApi, Snowflake};
use fxsignal::roles::{GrantStore, WeekendPolicy};

pub const GUILD: Snowflake = 1000;

#[derive(Default)]
pub struct FakeDiscord {
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    pub members: Vec<Member>,
    /// 发送消息时返回403的频道
    pub forbidden: HashSet<Snowflake>,
    /// 移除角色时返回的错误类型
    pub remove_error: Mutex<Option<fn() -> BotError>>,
    pub sent: Mutex<Vec<(Snowflake, String)>>,
    pub dms: Mutex<Vec<(Snowflake, String)>>,
    pub added_roles: Mutex<Vec<(Snowflake, Snowflake)>>,
    pub removed_roles: Mutex<Vec<(Snowflake, Snowflake)>>,
    pub responses: Mutex<Vec<InteractionResponse>>,
    pub edits: Mutex<Vec<String>>,
    pub registrations: Mutex<Vec<(Snowflake, usize)>>,
}

pub fn text_channel(id: Snowflake, name: &str) -> Channel {
    Channel {
        id,
        kind: 0,
        name: Some(name.to_string()),
        guild_id: Some(GUILD),
        position: Some(id as i64),
    }
}

pub fn voice_channel(id: Snowflake, name: &str) -> Channel {
    Channel {
        kind: 2,
        ..text_channel(id, name)
    }
}

pub fn member(id: Snowflake, name: &str, roles: Vec<Snowflake>, bot: bool) -> Member {
    Member {
        user: Some(User {
            id,
            username: name.to_string(),
            global_name: None,
            discriminator: None,
            bot,
        }),
        nick: None,
        roles,
    }
}

impl FakeDiscord {
    pub fn new() -> Self {
        Self {
            channels: vec![
                text_channel(1, "signals"),
                text_channel(2, "vip-signals"),
                voice_channel(3, "lounge"),
                text_channel(4, "locked"),
            ],
            roles: vec![Role {
                id: 77,
                name: "VIP".to_string(),
                position: 1,
            }],
            forbidden: HashSet::from([4]),
            ..Default::default()
        }
    }

    pub fn sent_to(&self, channel_id: Snowflake) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == channel_id)
            .map(|(_, content)| content.clone())
            .collect()
    }

    pub fn dms_to(&self, user_id: Snowflake) -> Vec<String> {
        self.dms
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, content)| content.clone())
            .collect()
    }
}

#[async_trait]
impl DiscordApi for FakeDiscord {
    async fn get_channel(&self, channel_id: Snowflake) -> Result<Channel> {
        self.channels
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| BotError::NotFound(format!("channel {}", channel_id)))
    }

    async fn guild_channels(&self, _guild_id: Snowflake) -> Result<Vec<Channel>> {
        Ok(self.channels.clone())
    }

    async fn guild_roles(&self, _guild_id: Snowflake) -> Result<Vec<Role>> {
        Ok(self.roles.clone())
    }

    async fn guild_members(&self, _guild_id: Snowflake) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }

    async fn send_message(&self, channel_id: Snowflake, content: &str) -> Result<Message> {
        if self.forbidden.contains(&channel_id) {
            return Err(BotError::PermissionError("Missing Access".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel_id, content.to_string()));
        Ok(Message {
            id: sent.len() as Snowflake,
            channel_id,
        })
    }

    async fn send_dm(&self, user_id: Snowflake, content: &str) -> Result<Message> {
        self.dms
            .lock()
            .unwrap()
            .push((user_id, content.to_string()));
        Ok(Message {
            id: 1,
            channel_id: user_id,
        })
    }

    async fn add_member_role(
        &self,
        _guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()> {
        self.added_roles.lock().unwrap().push((user_id, role_id));
        Ok(())
    }

    async fn remove_member_role(
        &self,
        _guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()> {
        if let Some(make_error) = *self.remove_error.lock().unwrap() {
            return Err(make_error());
        }
        self.removed_roles.lock().unwrap().push((user_id, role_id));
        Ok(())
    }

    async fn create_interaction_response(
        &self,
        _interaction_id: Snowflake,
        _token: &str,
        response: &InteractionResponse,
    ) -> Result<()> {
        self.responses.lock().unwrap().push(response.clone());
        Ok(())
    }

    async fn edit_original_response(
        &self,
        _application_id: Snowflake,
        _token: &str,
        content: &str,
    ) -> Result<()> {
        self.edits.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn create_followup(
        &self,
        _application_id: Snowflake,
        _token: &str,
        content: &str,
        _ephemeral: bool,
    ) -> Result<()> {
        self.edits.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn register_guild_commands(
        &self,
        _application_id: Snowflake,
        guild_id: Snowflake,
        commands: &[ApplicationCommand],
    ) -> Result<()> {
        self.registrations
            .lock()
            .unwrap()
            .push((guild_id, commands.len()));
        Ok(())
    }
}

/// 无抖动模拟器 + 临时状态文件的上下文
pub async fn context(
    api: Arc<FakeDiscord>,
    mut config: BotConfig,
    dir: &tempfile::TempDir,
) -> (BotContext, Arc<SimulatedBridge>) {
    config.trial_role.state_file = dir.path().join("auto_roles.json").display().to_string();
    let policy = WeekendPolicy::from_config(&config.trial_role);
    let grants = Arc::new(
        GrantStore::open(&config.trial_role.state_file, &policy)
            .await
            .unwrap(),
    );
    let simulator = Arc::new(SimulatedBridge::new().without_jitter());
    let bridge = Arc::new(
        FallbackBridge::new(config.bridge.clone(), None).with_simulator(Arc::clone(&simulator)),
    );

    let ctx = BotContext::builder()
        .with_config(config)
        .with_api(api)
        .with_grant_store(grants)
        .with_bridge(bridge)
        .build()
        .unwrap();
    (ctx, simulator)
}
