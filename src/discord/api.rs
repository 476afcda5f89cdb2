use async_trait::async_trait;

use crate::core::error::Result;
use crate::discord::model::{
    ApplicationCommand, Channel, InteractionResponse, Member, Message, Role, Snowflake,
};

/// Discord平台通用接口trait
///
/// 业务模块只依赖这个trait，REST实现见 [`crate::discord::rest::DiscordHttp`]，
/// 测试中使用内存实现。
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// 获取频道
    async fn get_channel(&self, channel_id: Snowflake) -> Result<Channel>;

    /// 获取服务器全部频道（按服务器返回顺序）
    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<Channel>>;

    /// 获取服务器角色
    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>>;

    /// 获取服务器成员（自动分页）
    async fn guild_members(&self, guild_id: Snowflake) -> Result<Vec<Member>>;

    /// 发送频道消息
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> Result<Message>;

    /// 发送私信
    async fn send_dm(&self, user_id: Snowflake, content: &str) -> Result<Message>;

    /// 给成员添加角色
    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()>;

    /// 移除成员角色
    async fn remove_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<()>;

    /// 回复交互
    async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<()>;

    /// 编辑延迟回复的原始消息
    async fn edit_original_response(
        &self,
        application_id: Snowflake,
        token: &str,
        content: &str,
    ) -> Result<()>;

    /// 追加一条交互消息
    async fn create_followup(
        &self,
        application_id: Snowflake,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()>;

    /// 覆盖注册服务器级命令
    async fn register_guild_commands(
        &self,
        application_id: Snowflake,
        guild_id: Snowflake,
        commands: &[ApplicationCommand],
    ) -> Result<()>;
}
