//! 斜杠命令参数读取

use serde_json::Value;

use crate::core::error::{BotError, Result};
use crate::discord::model::CommandOptionValue;
use crate::discord::Snowflake;

/// 对命令参数列表的只读视图
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions<'a> {
    options: &'a [CommandOptionValue],
}

impl<'a> CommandOptions<'a> {
    pub fn new(options: &'a [CommandOptionValue]) -> Self {
        Self { options }
    }

    fn value(&self, name: &str) -> Option<&'a Value> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
    }

    pub fn string(&self, name: &str) -> Option<String> {
        match self.value(name)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn required_string(&self, name: &str) -> Result<String> {
        self.string(name)
            .ok_or_else(|| BotError::validation(name, "is required"))
    }

    pub fn number(&self, name: &str) -> Result<Option<f64>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| BotError::validation(name, format!("`{}` is not a number", s))),
            Some(_) => Err(BotError::validation(name, "must be a number")),
        }
    }

    pub fn required_number(&self, name: &str) -> Result<f64> {
        self.number(name)?
            .ok_or_else(|| BotError::validation(name, "is required"))
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| BotError::validation(name, "must be a whole number")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| BotError::validation(name, format!("`{}` is not a whole number", s))),
            Some(_) => Err(BotError::validation(name, "must be a whole number")),
        }
    }

    /// 非负整数计数
    pub fn count(&self, name: &str) -> Result<Option<u64>> {
        match self.integer(name)? {
            None => Ok(None),
            Some(n) if n < 0 => Err(BotError::validation(name, "must not be negative")),
            Some(n) => Ok(Some(n as u64)),
        }
    }

    pub fn required_count(&self, name: &str) -> Result<u64> {
        self.count(name)?
            .ok_or_else(|| BotError::validation(name, "is required"))
    }

    pub fn boolean(&self, name: &str) -> bool {
        match self.value(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// 角色/用户类参数，值为字符串形式的ID
    pub fn snowflake(&self, name: &str) -> Result<Option<Snowflake>> {
        match self.string(name) {
            None => Ok(None),
            Some(s) => s
                .trim_start_matches("<@&")
                .trim_end_matches('>')
                .parse()
                .map(Some)
                .map_err(|_| BotError::validation(name, format!("`{}` is not a valid id", s))),
        }
    }

    pub fn required_snowflake(&self, name: &str) -> Result<Snowflake> {
        self.snowflake(name)?
            .ok_or_else(|| BotError::validation(name, "is required"))
    }

    /// 自动补全时正在输入的参数 (名称, 当前文本)
    pub fn focused(&self) -> Option<(&'a str, String)> {
        self.options.iter().find(|o| o.focused).map(|o| {
            let current = match &o.value {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            (o.name.as_str(), current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opt(name: &str, value: Value) -> CommandOptionValue {
        CommandOptionValue {
            name: name.into(),
            kind: 3,
            value: Some(value),
            focused: false,
            options: Vec::new(),
        }
    }

    #[test]
    fn reads_typed_values() {
        let raw = vec![
            opt("pair", json!(" GBPUSD ")),
            opt("price", json!(1.25)),
            opt("hits", json!(3)),
            opt("trade", json!(true)),
            opt("role", json!("123456789012345678")),
        ];
        let opts = CommandOptions::new(&raw);
        assert_eq!(opts.string("pair").as_deref(), Some("GBPUSD"));
        assert_eq!(opts.required_number("price").unwrap(), 1.25);
        assert_eq!(opts.required_count("hits").unwrap(), 3);
        assert!(opts.boolean("trade"));
        assert_eq!(opts.snowflake("role").unwrap(), Some(123456789012345678));
        assert!(opts.string("missing").is_none());
        assert!(opts.required_string("missing").is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let raw = vec![opt("sl_hits", json!(-1))];
        let err = CommandOptions::new(&raw).count("sl_hits").unwrap_err();
        assert!(matches!(err, BotError::ValidationError { .. }));
    }

    #[test]
    fn focused_option() {
        let mut focused = opt("pair", json!("usd"));
        focused.focused = true;
        let raw = vec![opt("entry_type", json!("Buy limit")), focused];
        assert_eq!(
            CommandOptions::new(&raw).focused(),
            Some(("pair", "usd".to_string()))
        );
    }
}
