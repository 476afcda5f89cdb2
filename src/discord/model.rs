//! Discord API v10 数据结构（只保留本项目用到的字段）

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

/// Discord雪花ID在JSON中以字符串传输
pub type Snowflake = u64;

pub const CHANNEL_GUILD_TEXT: u8 = 0;
pub const CHANNEL_GUILD_ANNOUNCEMENT: u8 = 5;
pub const CHANNEL_PUBLIC_THREAD: u8 = 11;
pub const CHANNEL_PRIVATE_THREAD: u8 = 12;

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
pub const INTERACTION_AUTOCOMPLETE: u8 = 4;

pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
pub const RESPONSE_AUTOCOMPLETE_RESULT: u8 = 8;

pub const FLAG_EPHEMERAL: u64 = 1 << 6;

pub const OPTION_STRING: u8 = 3;
pub const OPTION_INTEGER: u8 = 4;
pub const OPTION_BOOLEAN: u8 = 5;
pub const OPTION_ROLE: u8 = 8;
pub const OPTION_NUMBER: u8 = 10;

pub const PERMISSION_MANAGE_ROLES: u64 = 1 << 28;
pub const PERMISSION_MANAGE_GUILD: u64 = 1 << 5;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// 类似 `name#1234` 的展示名，新用户名体系没有discriminator
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

impl Member {
    pub fn user_id(&self) -> Option<Snowflake> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

impl Role {
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub position: Option<i64>,
}

impl Channel {
    /// 可以直接发送消息的频道类型
    pub fn is_text(&self) -> bool {
        matches!(
            self.kind,
            CHANNEL_GUILD_TEXT
                | CHANNEL_GUILD_ANNOUNCEMENT
                | CHANNEL_PUBLIC_THREAD
                | CHANNEL_PRIVATE_THREAD
        )
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub channel_id: Snowflake,
}

// ============= 交互 =============

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde_as(as = "DisplayFromStr")]
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

impl Interaction {
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOptionValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOptionValue {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub options: Vec<CommandOptionValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<CommandChoice>>,
}

impl InteractionResponse {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(InteractionCallbackData {
                content: Some(content.into()),
                flags: Some(FLAG_EPHEMERAL),
                choices: None,
            }),
        }
    }

    /// 先占位，命令处理完成后再编辑原始回复
    pub fn deferred_ephemeral() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: Some(InteractionCallbackData {
                content: None,
                flags: Some(FLAG_EPHEMERAL),
                choices: None,
            }),
        }
    }

    pub fn autocomplete(choices: Vec<CommandChoice>) -> Self {
        Self {
            kind: RESPONSE_AUTOCOMPLETE_RESULT,
            data: Some(InteractionCallbackData {
                content: None,
                flags: None,
                choices: Some(choices),
            }),
        }
    }
}

// ============= 命令定义 =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: Value,
}

impl CommandChoice {
    pub fn string(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Value::String(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOptionDef {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
    #[serde(default)]
    pub autocomplete: bool,
}

impl CommandOptionDef {
    pub fn new(kind: u8, name: &str, description: &str, required: bool) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: description.to_string(),
            required,
            choices: Vec::new(),
            autocomplete: false,
        }
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| CommandChoice::string(c, c)).collect();
        self
    }

    pub fn with_autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationCommand {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub options: Vec<CommandOptionDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<String>,
}

// ============= 网关事件 =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PartialApplication {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: User,
    pub session_id: String,
    pub application: PartialApplication,
    #[serde(default)]
    pub guilds: Vec<PartialGuild>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GuildCreate {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub presences: Vec<PresenceUpdate>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceUser {
    #[serde_as(as = "DisplayFromStr")]
    pub id: Snowflake,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceUpdate {
    pub user: PresenceUser,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub status: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberAdd {
    #[serde_as(as = "DisplayFromStr")]
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}
