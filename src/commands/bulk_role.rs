//! `/bulk_role`

use log::info;

use crate::bot::BotContext;
use crate::commands::options::CommandOptions;
use crate::core::error::Result;
use crate::discord::Snowflake;
use crate::roles::{assign_bulk_role, BulkRoleRequest, PresenceFilter};

pub fn parse_request(guild_id: Snowflake, opts: &CommandOptions<'_>) -> Result<BulkRoleRequest> {
    let filter: PresenceFilter = opts.required_string("filter")?.parse()?;
    Ok(BulkRoleRequest {
        guild_id,
        role_id: opts.required_snowflake("role")?,
        filter,
        include_role: opts.snowflake("include_role")?,
        exclude_role: opts.snowflake("exclude_role")?,
    })
}

pub async fn handle(
    ctx: &BotContext,
    guild_id: Snowflake,
    opts: &CommandOptions<'_>,
) -> Result<String> {
    let request = parse_request(guild_id, opts)?;
    info!(
        "👥 批量授予角色: role={} filter={:?} include={:?} exclude={:?}",
        request.role_id, request.filter, request.include_role, request.exclude_role
    );

    let report = assign_bulk_role(ctx.api.as_ref(), &ctx.presence, &request).await?;
    Ok(report.summary(&format!("<@&{}>", request.role_id)))
}
