//! 日志初始化
//!
//! 配置了 `file_dir` 时用 log4rs 输出到控制台和按大小滚动的文件，
//! 否则退回 env_logger（`RUST_LOG` 可覆盖级别）。

use anyhow::Context;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::io::Write;
use std::path::Path;

use crate::core::config::LoggingConfig;

const LINE_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)}] [{l}] [{M}] {m}{n}";
const LOG_FILE: &str = "fxsignal.log";

pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

pub fn init_logger(config: &LoggingConfig) -> anyhow::Result<()> {
    match config.file_dir.as_deref() {
        Some(dir) => init_log4rs(config, dir),
        None => {
            init_env_logger(&config.level);
            Ok(())
        }
    }
}

fn init_env_logger(level: &str) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level.to_lowercase());
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn init_log4rs(config: &LoggingConfig, dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("创建日志目录失败: {}", dir))?;
    let file_path = Path::new(dir).join(LOG_FILE);
    let archive_pattern = Path::new(dir).join("fxsignal.{}.log");

    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), config.max_files.max(1))
        .map_err(|e| anyhow::anyhow!("日志滚动配置错误: {}", e))?;
    let trigger = SizeTrigger::new(config.max_file_size_mb.max(1) * 1024 * 1024);
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LINE_PATTERN)))
        .build(&file_path, Box::new(policy))
        .with_context(|| format!("打开日志文件失败: {}", file_path.display()))?;

    let mut builder = Config::builder().appender(Appender::builder().build("file", Box::new(file)));
    let mut root = Root::builder().appender("file");
    if config.console_output {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LINE_PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("console", Box::new(console)));
        root = root.appender("console");
    }

    let log_config = builder
        .build(root.build(parse_level(&config.level)))
        .context("日志配置无效")?;
    log4rs::init_config(log_config).context("日志系统初始化失败")?;

    log::info!("📝 日志输出到 {}", file_path.display());
    Ok(())
}
