// 斜杠命令 - 定义、路由与各命令处理
pub mod bulk_role;
pub mod entry;
pub mod options;
pub mod stats;
pub mod trading;
pub mod trial_role;

use log::{debug, error, info, warn};

use crate::bot::BotContext;
use crate::core::error::{BotError, ErrorSeverity, Result};
use crate::discord::model::{
    ApplicationCommand, CommandOptionDef, Interaction, InteractionResponse,
    INTERACTION_APPLICATION_COMMAND, INTERACTION_AUTOCOMPLETE, OPTION_BOOLEAN, OPTION_INTEGER,
    OPTION_NUMBER, OPTION_ROLE, OPTION_STRING, PERMISSION_MANAGE_GUILD, PERMISSION_MANAGE_ROLES,
};
use crate::discord::Snowflake;

pub use options::CommandOptions;

fn command(name: &str, description: &str, options: Vec<CommandOptionDef>) -> ApplicationCommand {
    ApplicationCommand {
        name: name.to_string(),
        description: description.to_string(),
        options,
        default_member_permissions: None,
    }
}

fn restricted(mut cmd: ApplicationCommand, permission: u64) -> ApplicationCommand {
    cmd.default_member_permissions = Some(permission.to_string());
    cmd
}

/// 注册到每个服务器的命令；必填参数必须排在可选参数之前
pub fn definitions() -> Vec<ApplicationCommand> {
    vec![
        command(
            "entry",
            "Send a trading signal with calculated TP and SL levels",
            vec![
                CommandOptionDef::new(OPTION_STRING, "entry_type", "Type of entry", true)
                    .with_autocomplete(),
                CommandOptionDef::new(OPTION_STRING, "pair", "Trading pair", true)
                    .with_autocomplete(),
                CommandOptionDef::new(OPTION_NUMBER, "price", "Entry price", true),
                CommandOptionDef::new(
                    OPTION_STRING,
                    "channels",
                    "Channels to send to (comma separated names, ids or #mentions)",
                    true,
                ),
                CommandOptionDef::new(
                    OPTION_STRING,
                    "roles",
                    "Roles to mention (comma separated, `everyone` for @everyone)",
                    true,
                ),
                CommandOptionDef::new(
                    OPTION_STRING,
                    "custom_pair",
                    "Custom pair when pair is Other",
                    false,
                ),
                CommandOptionDef::new(
                    OPTION_INTEGER,
                    "decimals",
                    "Decimal places for the custom pair (0-8)",
                    false,
                ),
                CommandOptionDef::new(
                    OPTION_BOOLEAN,
                    "trade",
                    "Also open the trade on the connected account",
                    false,
                ),
            ],
        ),
        command(
            "stats",
            "Send trading statistics to channels",
            vec![
                CommandOptionDef::new(
                    OPTION_STRING,
                    "date_range",
                    "Date range, e.g. 1-7 January",
                    true,
                ),
                CommandOptionDef::new(OPTION_INTEGER, "total_signals", "Total signals sent", true),
                CommandOptionDef::new(OPTION_INTEGER, "tp1_hits", "Signals that reached TP1", true),
                CommandOptionDef::new(OPTION_INTEGER, "tp2_hits", "Signals that reached TP2", true),
                CommandOptionDef::new(OPTION_INTEGER, "tp3_hits", "Signals that reached TP3", true),
                CommandOptionDef::new(
                    OPTION_INTEGER,
                    "sl_hits",
                    "Signals that hit the stop loss",
                    true,
                ),
                CommandOptionDef::new(OPTION_STRING, "channels", "Channels to send to", true),
                CommandOptionDef::new(
                    OPTION_STRING,
                    "currently_open",
                    "Open trades text (defaults to tracked signals)",
                    false,
                ),
                CommandOptionDef::new(
                    OPTION_INTEGER,
                    "total_closed",
                    "Closed trades (defaults to TP1 + SL)",
                    false,
                ),
            ],
        ),
        restricted(
            command(
                "bulk_role",
                "Give a role to many members at once",
                vec![
                    CommandOptionDef::new(OPTION_ROLE, "role", "Role to give", true),
                    CommandOptionDef::new(OPTION_STRING, "filter", "Which members to include", true)
                        .with_choices(&["online", "offline", "both"]),
                    CommandOptionDef::new(
                        OPTION_ROLE,
                        "include_role",
                        "Only members with this role",
                        false,
                    ),
                    CommandOptionDef::new(
                        OPTION_ROLE,
                        "exclude_role",
                        "Skip members with this role",
                        false,
                    ),
                ],
            ),
            PERMISSION_MANAGE_ROLES,
        ),
        restricted(
            command(
                "trial_role",
                "Manage the automatic trial role for new members",
                vec![
                    CommandOptionDef::new(OPTION_STRING, "action", "What to do", true)
                        .with_choices(&["enable", "disable", "status", "list"]),
                    CommandOptionDef::new(OPTION_ROLE, "role", "Trial role (for enable)", false),
                ],
            ),
            PERMISSION_MANAGE_ROLES,
        ),
        restricted(
            command(
                "trading",
                "Connect or inspect the trading account",
                vec![
                    CommandOptionDef::new(OPTION_STRING, "action", "What to do", true)
                        .with_choices(&["setup", "status"]),
                    CommandOptionDef::new(
                        OPTION_STRING,
                        "account_id",
                        "MetaApi account id (for setup)",
                        false,
                    ),
                    CommandOptionDef::new(
                        OPTION_STRING,
                        "region",
                        "MetaApi region (for setup)",
                        false,
                    ),
                ],
            ),
            PERMISSION_MANAGE_GUILD,
        ),
    ]
}

/// 把交互分发给对应命令，错误统一在这里转成用户可读的回复
pub struct CommandRouter {
    ctx: BotContext,
}

impl CommandRouter {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, interaction: &Interaction) -> Result<()> {
        match interaction.kind {
            INTERACTION_AUTOCOMPLETE => self.autocomplete(interaction).await,
            INTERACTION_APPLICATION_COMMAND => self.command(interaction).await,
            other => {
                debug!("忽略交互类型: {}", other);
                Ok(())
            }
        }
    }

    async fn autocomplete(&self, interaction: &Interaction) -> Result<()> {
        let (name, options) = match &interaction.data {
            Some(data) => (data.name.as_str(), data.options.as_slice()),
            None => return Ok(()),
        };
        let choices = match CommandOptions::new(options).focused() {
            Some((option, current)) if name == "entry" => entry::autocomplete(option, &current),
            _ => Vec::new(),
        };
        self.ctx
            .api
            .create_interaction_response(
                interaction.id,
                &interaction.token,
                &InteractionResponse::autocomplete(choices),
            )
            .await
    }

    async fn command(&self, interaction: &Interaction) -> Result<()> {
        let Some(data) = &interaction.data else {
            return Ok(());
        };
        let Some(guild_id) = interaction.guild_id else {
            return self
                .ctx
                .api
                .create_interaction_response(
                    interaction.id,
                    &interaction.token,
                    &InteractionResponse::ephemeral("❌ Commands can only be used inside a server."),
                )
                .await;
        };

        let invoker = interaction
            .invoker()
            .map(|u| u.tag())
            .unwrap_or_else(|| "unknown".to_string());
        info!("⌨️ /{} 由 {} 在服务器 {} 调用", data.name, invoker, guild_id);

        self.ctx
            .api
            .create_interaction_response(
                interaction.id,
                &interaction.token,
                &InteractionResponse::deferred_ephemeral(),
            )
            .await?;

        let opts = CommandOptions::new(&data.options);
        let reply = match self.execute(&data.name, guild_id, &opts).await {
            Ok(reply) => reply,
            Err(e) => {
                match e.severity() {
                    ErrorSeverity::Info | ErrorSeverity::Warning => {
                        warn!("⚠️ /{} 失败: {}", data.name, e)
                    }
                    _ => error!("❌ /{} 失败: {}", data.name, e),
                }
                format!("❌ {}", e.user_friendly_message())
            }
        };

        self.ctx
            .api
            .edit_original_response(interaction.application_id, &interaction.token, &reply)
            .await
    }

    /// 执行命令并返回回复文本
    pub async fn execute(
        &self,
        name: &str,
        guild_id: Snowflake,
        opts: &CommandOptions<'_>,
    ) -> Result<String> {
        let ctx = &self.ctx;
        match name {
            "entry" => entry::handle(ctx, guild_id, opts).await,
            "stats" => stats::handle(ctx, guild_id, opts).await,
            "bulk_role" => bulk_role::handle(ctx, guild_id, opts).await,
            "trial_role" => trial_role::handle(ctx, guild_id, opts).await,
            "trading" => trading::handle(ctx, guild_id, opts).await,
            other => Err(BotError::NotFound(format!("command /{}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_options_come_first() {
        for cmd in definitions() {
            let first_optional = cmd.options.iter().position(|o| !o.required);
            if let Some(idx) = first_optional {
                assert!(
                    cmd.options[idx..].iter().all(|o| !o.required),
                    "/{} has a required option after an optional one",
                    cmd.name
                );
            }
        }
    }

    #[test]
    fn admin_commands_are_restricted() {
        let defs = definitions();
        let perms = |name: &str| {
            defs.iter()
                .find(|c| c.name == name)
                .and_then(|c| c.default_member_permissions.clone())
        };
        assert_eq!(perms("entry"), None);
        assert_eq!(perms("bulk_role"), Some((1u64 << 28).to_string()));
        assert_eq!(perms("trading"), Some((1u64 << 5).to_string()));
        assert_eq!(defs.len(), 5);
    }
}
