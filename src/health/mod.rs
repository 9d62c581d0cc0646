//! 健康检测模块
//!
//! 提供带重试的HTTP请求、并发健康检测、端口就绪等待和响应体JSON辅助函数

pub mod checker;
pub mod client;
pub mod json;
pub mod readiness;
pub mod result;
pub mod retry;

// 重新导出主要类型
pub use checker::{CheckOptions, HealthChecker, HttpHealthChecker};
pub use client::{ProbeClient, ProbeRequest, INTERNAL_API_KEY_HEADER};
pub use readiness::{host_port, wait_until_ready, ReadinessOptions};
pub use result::{Endpoint, EndpointResult, FanoutReport, HealthStatus, RequestOutcome};
pub use retry::{Backoff, RetryPolicy};
