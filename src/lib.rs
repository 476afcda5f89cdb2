pub mod bot;
pub mod bridge;
pub mod commands;
pub mod core;
pub mod discord;
pub mod roles;
pub mod signals;
pub mod utils;

pub use bot::{Bot, BotContext};
pub use core::error::{BotError, Result};
