//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;

/// Service Probe - 带重试的HTTP探测工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "service-probe",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "SERVICE_PROBE_LOG_LEVEL",
        global = true
    )]
    pub log_level: LogLevel,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出", global = true)]
    pub verbose: bool,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志", global = true)]
    pub json_logs: bool,

    /// 日志写入文件而不是控制台
    #[arg(long, value_name = "FILE", help = "日志文件路径", global = true)]
    pub log_file: Option<PathBuf>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 并发检测所有目标
    Check {
        /// 检测目标文件（TOML），不指定则使用环境变量中的服务地址
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "检测目标文件",
            env = "SERVICE_PROBE_ENDPOINTS"
        )]
        file: Option<PathBuf>,

        /// 输出格式
        #[arg(long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,

        /// 单个目标的超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "10",
            help = "单个目标的超时时间（秒）"
        )]
        timeout: u64,

        /// 单个目标的重试次数
        #[arg(short, long, value_name = "COUNT", default_value = "0", help = "重试次数")]
        retries: u32,

        /// 响应体必须是合法JSON
        #[arg(long, help = "响应体必须是合法JSON")]
        require_json: bool,

        /// 检测前等待端口就绪（秒）
        #[arg(long, value_name = "SECONDS", help = "检测前等待端口就绪（秒）")]
        ready_wait: Option<u64>,
    },

    /// 发送一次带重试的请求
    Request {
        /// HTTP方法
        #[arg(value_name = "METHOD", help = "HTTP方法")]
        method: String,

        /// 目标URL
        #[arg(value_name = "URL", help = "目标URL")]
        url: String,

        /// JSON请求体
        #[arg(short, long, value_name = "JSON", help = "JSON请求体")]
        data: Option<String>,

        /// 请求头，格式 `Name: value`，可重复
        #[arg(short = 'H', long = "header", value_name = "HEADER", help = "请求头（Name: value）")]
        headers: Vec<String>,

        /// 最大重试次数，默认取 PROBE_MAX_RETRIES
        #[arg(short, long, value_name = "COUNT", help = "最大重试次数")]
        retries: Option<u32>,

        /// 请求超时时间（秒）
        #[arg(short, long, value_name = "SECONDS", help = "请求超时时间（秒）")]
        timeout: Option<u64>,
    },

    /// 等待服务端口就绪
    Wait {
        /// 服务基础URL
        #[arg(value_name = "BASE_URL", help = "服务基础URL")]
        base: String,

        /// 最长等待时间（秒），默认取 PROBE_READY_WAIT_SECS
        #[arg(short, long, value_name = "SECONDS", help = "最长等待时间（秒）")]
        max_wait: Option<u64>,
    },

    /// 显示生效的检测目标
    Endpoints {
        /// 检测目标文件（TOML）
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "检测目标文件",
            env = "SERVICE_PROBE_ENDPOINTS"
        )]
        file: Option<PathBuf>,

        /// 输出格式
        #[arg(long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
    /// 表格格式
    Table,
}

impl Args {
    /// 是否启用详细输出
    pub fn is_verbose(&self) -> bool {
        self.verbose || matches!(self.log_level, LogLevel::Debug)
    }
}

/// 解析 `Name: value` 形式的请求头
pub fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>, String> {
    raw.iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| format!("无效的请求头: {header}"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("请求头名称不能为空: {header}"));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
