// Discord平台层 - REST、网关与在线状态
pub mod api;
pub mod gateway;
pub mod model;
pub mod presence;
pub mod rest;

pub use api::DiscordApi;
pub use gateway::{EventHandler, GatewayClient, GatewayConfig, GatewayEvent};
pub use model::Snowflake;
pub use presence::PresenceCache;
pub use rest::DiscordHttp;
