use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::error::{BotError, Result};
use crate::core::retry_policy::ExponentialBackoffRetry;
use crate::discord::api::DiscordApi;
use crate::discord::model::{
    ApplicationCommand, Channel, InteractionResponse, Member, Message, Role, Snowflake,
    FLAG_EPHEMERAL,
};

const MEMBER_PAGE_SIZE: usize = 1000;

/// Discord错误响应体
#[derive(Debug, Deserialize)]
struct DiscordErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Discord REST客户端
pub struct DiscordHttp {
    client: Client,
    api_base: String,
    token: String,
    retry: ExponentialBackoffRetry,
}

impl DiscordHttp {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("DiscordBot (https://github.com/fxsignal, 0.1)")
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry: ExponentialBackoffRetry::default(),
        })
    }

    /// 发送请求并解析JSON，429/5xx自动重试
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let text = self.request_text(method, path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 发送请求，忽略响应体（204等）
    async fn request_empty(&self, method: Method, path: &str, body: Option<&Value>) -> Result<()> {
        self.request_text(method, path, body).await.map(|_| ())
    }

    async fn request_text(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        let url = format!("{}{}", self.api_base, path);
        let url = url.as_str();
        self.retry
            .execute_with_retry(move || self.execute_once(method.clone(), url, body))
            .await
    }

    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        debug!("📤 Discord {} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(text);
        }

        Err(map_error(status, &text))
    }
}

/// 把HTTP状态码映射为统一错误类型
fn map_error(status: StatusCode, text: &str) -> BotError {
    let parsed: Option<DiscordErrorBody> = serde_json::from_str(text).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| text.to_string());

    match status {
        StatusCode::UNAUTHORIZED => BotError::AuthError(message),
        StatusCode::FORBIDDEN => BotError::PermissionError(message),
        StatusCode::NOT_FOUND => BotError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = parsed
                .and_then(|b| b.retry_after)
                .map(|secs| secs.ceil().max(1.0) as u64);
            warn!("⚠️ Discord速率限制, retry_after={:?}", retry_after);
            BotError::RateLimitError(message, retry_after)
        }
        _ => BotError::ApiError {
            code: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl DiscordApi for DiscordHttp {
    async fn get_channel(&self, channel_id: Snowflake) -> Result<Channel> {
        self.request(Method::GET, &format!("/channels/{}", channel_id), None)
            .await
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<Channel>> {
        let mut channels: Vec<Channel> = self
            .request(Method::GET, &format!("/guilds/{}/channels", guild_id), None)
            .await?;
        // 按客户端展示顺序排列，同名频道"取第一个"时与用户看到的一致
        channels.sort_by_key(|c| (c.position.unwrap_or(i64::MAX), c.id));
        Ok(channels)
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>> {
        self.request(Method::GET, &format!("/guilds/{}/roles", guild_id), None)
            .await
    }

    async fn guild_members(&self, guild_id: Snowflake) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        let mut after: Snowflake = 0;

        loop {
            let page: Vec<Member> = self
                .request(
                    Method::GET,
                    &format!(
                        "/guilds/{}/members?limit={}&after={}",
                        guild_id, MEMBER_PAGE_SIZE, after
                    ),
                    None,
                )
                .await?;

            let page_len = page.len();
            if let Some(last) = page.iter().filter_map(Member::user_id).max() {
                after = last;
            }
            members.extend(page);

            if page_len < MEMBER_PAGE_SIZE {
                break;
            }
        }

        debug!("服务器 {} 共拉取 {} 名成员", guild_id, members.len());
        Ok(members)
    }

    async fn send_message(&self, channel_id: Snowflake, content: &str) -> Result<Message> {
        let body = json!({
            "content": content,
            "allowed_mentions": { "parse": ["roles", "users", "everyone"] }
        });
        self.request(
            Method::POST,
            &format!("/channels/{}/messages", channel_id),
            Some(&body),
        )
        .await
    }

    async fn send_dm(&self, user_id: Snowflake, content: &str) -> Result<Message> {
        let body = json!({ "recipient_id": user_id.to_string() });
        let channel: Channel = self
            .request(Method::POST, "/users/@me/channels", Some(&body))
            .await?;
        self.send_message(channel.id, content).await
    }

    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()> {
        self.request_empty(
            Method::PUT,
            &format!("/guilds/{}/members/{}/roles/{}", guild_id, user_id, role_id),
            None,
        )
        .await
    }

    async fn remove_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()> {
        self.request_empty(
            Method::DELETE,
            &format!("/guilds/{}/members/{}/roles/{}", guild_id, user_id, role_id),
            None,
        )
        .await
    }

    async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<()> {
        let body = serde_json::to_value(response)?;
        self.request_empty(
            Method::POST,
            &format!("/interactions/{}/{}/callback", interaction_id, token),
            Some(&body),
        )
        .await
    }

    async fn edit_original_response(
        &self,
        application_id: Snowflake,
        token: &str,
        content: &str,
    ) -> Result<()> {
        let body = json!({ "content": content });
        self.request_empty(
            Method::PATCH,
            &format!("/webhooks/{}/{}/messages/@original", application_id, token),
            Some(&body),
        )
        .await
    }

    async fn create_followup(
        &self,
        application_id: Snowflake,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        let mut body = json!({ "content": content });
        if ephemeral {
            body["flags"] = json!(FLAG_EPHEMERAL);
        }
        self.request_empty(
            Method::POST,
            &format!("/webhooks/{}/{}", application_id, token),
            Some(&body),
        )
        .await
    }

    async fn register_guild_commands(
        &self,
        application_id: Snowflake,
        guild_id: Snowflake,
        commands: &[ApplicationCommand],
    ) -> Result<()> {
        let body = serde_json::to_value(commands)?;
        self.request_empty(
            Method::PUT,
            &format!("/applications/{}/guilds/{}/commands", application_id, guild_id),
            Some(&body),
        )
        .await
    }
}
