//! Service Probe - 带重试的HTTP探测工具
//!
//! 用于对一组独立部署的HTTP服务做黑盒探测，支持：
//! - 传输层失败时按指数退避重试的HTTP请求
//! - 多个目标的并发健康检测与汇总报告
//! - 基于TCP连接的端口就绪等待
//! - 环境变量与 `.env` 文件配置
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;

// 重新导出主要类型
pub use config::{ClientConfig, ProbeConfig, ServiceBases};
pub use error::ProbeError;
pub use health::{
    CheckOptions, Endpoint, FanoutReport, HealthChecker, HttpHealthChecker, ProbeClient,
    RequestOutcome, RetryPolicy,
};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
