//! `/trading`：配置实盘账户并查看交易桥状态

use log::info;

use crate::bot::BotContext;
use crate::bridge::TradeBridge;
use crate::commands::options::CommandOptions;
use crate::core::error::{BotError, Result};
use crate::discord::Snowflake;

pub async fn handle(
    ctx: &BotContext,
    _guild_id: Snowflake,
    opts: &CommandOptions<'_>,
) -> Result<String> {
    let action = opts.required_string("action")?.to_lowercase();
    match action.as_str() {
        "setup" => {
            if !ctx.bridge.settings().enabled {
                return Ok("⚠️ Trading bridge is disabled in the configuration.".to_string());
            }
            let account_id = opts.required_string("account_id")?;
            let region = opts.string("region");
            info!("🔧 配置交易账户: {} ({:?})", account_id, region);
            let status = ctx
                .bridge
                .configure_live(&account_id, region.as_deref())
                .await?;
            Ok(format!("✅ Trading account connected.\n{}", status.describe()))
        }
        "status" => Ok(ctx.bridge.status().await.describe()),
        other => Err(BotError::validation(
            "action",
            format!("unknown action `{}`", other),
        )),
    }
}
