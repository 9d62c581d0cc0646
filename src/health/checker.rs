//! 并发健康检测器实现
//!
//! 为每个目标启动一个独立任务发送GET请求，等待全部完成后汇总报告。
//! 单个目标的慢响应或失败只影响它自己的结果。

use crate::health::client::{ProbeClient, ProbeRequest};
use crate::health::json;
use crate::health::readiness::{wait_until_ready, ReadinessOptions};
use crate::health::result::{Endpoint, EndpointResult, FanoutReport, HealthStatus, RequestOutcome};
use crate::health::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

/// 健康检测器trait，定义检测接口
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// 检测单个目标
    ///
    /// # 参数
    /// * `endpoint` - 探测目标
    ///
    /// # 返回
    /// * `EndpointResult` - 检测结果，失败信息记录在结果中
    async fn check(&self, endpoint: &Endpoint) -> EndpointResult;

    /// 并发检测所有目标
    ///
    /// # 参数
    /// * `endpoints` - 探测目标列表
    ///
    /// # 返回
    /// * `FanoutReport` - 汇总报告，结果顺序与输入一致
    async fn check_all(&self, endpoints: &[Endpoint]) -> FanoutReport;
}

/// 检测参数
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// 单个目标的超时时间（含重试）
    pub timeout: Duration,
    /// 单个目标的重试策略
    pub retry: RetryPolicy,
    /// 响应体必须是合法的JSON对象
    pub require_json: bool,
    /// 检测前先等待端口就绪
    pub readiness_gate: Option<ReadinessOptions>,
}

impl CheckOptions {
    /// 单次尝试的超时时间
    ///
    /// 总超时扣除退避等待后平分给每次尝试；
    /// 退避时间已超出总超时时退回总超时，由外层超时截断。
    pub fn attempt_timeout(&self) -> Duration {
        let budget = self.timeout.saturating_sub(self.retry.total_backoff());
        let per_attempt = budget / self.retry.max_attempts();
        if per_attempt.is_zero() {
            self.timeout
        } else {
            per_attempt
        }
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::none(),
            require_json: false,
            readiness_gate: None,
        }
    }
}

/// 基于HTTP GET的健康检测器
#[derive(Debug, Clone)]
pub struct HttpHealthChecker {
    /// 共享的探测客户端
    client: ProbeClient,
    /// 检测参数
    options: CheckOptions,
}

impl HttpHealthChecker {
    /// 创建新的健康检测器
    pub fn new(client: ProbeClient, options: CheckOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// 执行一次GET并根据响应生成结果
    async fn probe(&self, endpoint: &Endpoint) -> EndpointResult {
        let request = ProbeRequest::get(&endpoint.url)
            .with_timeout(self.options.attempt_timeout())
            .with_retry(self.options.retry);

        let start_time = Instant::now();
        match timeout(self.options.timeout, self.client.execute(&request)).await {
            Ok(Ok(outcome)) => self.evaluate(endpoint, &outcome),
            Ok(Err(e)) => EndpointResult::new(endpoint, HealthStatus::Down)
                .with_response_time(start_time.elapsed())
                .with_error(e.to_string()),
            Err(_) => EndpointResult::new(endpoint, HealthStatus::Down)
                .with_response_time(start_time.elapsed())
                .with_error(format!("检测超时（{:?}）", self.options.timeout)),
        }
    }

    /// 判断响应是否健康：状态码必须为200，按需校验JSON
    fn evaluate(&self, endpoint: &Endpoint, outcome: &RequestOutcome) -> EndpointResult {
        let parsed = json::parse_object(&outcome.body).map(serde_json::Value::Object);
        let message = parsed
            .as_ref()
            .ok()
            .and_then(json::message)
            .map(str::to_string);

        let base = EndpointResult::new(endpoint, HealthStatus::Up)
            .with_status_code(outcome.status_code())
            .with_response_time(outcome.elapsed)
            .with_message(message);

        if outcome.status != StatusCode::OK {
            let mut result = base.with_error(format!(
                "HTTP {} {}",
                outcome.status.as_u16(),
                outcome.status.canonical_reason().unwrap_or("Unknown")
            ));
            result.status = HealthStatus::Down;
            return result;
        }

        match parsed {
            Err(e) if self.options.require_json => {
                let mut result = base.with_error(format!("响应不是合法的JSON: {e}"));
                result.status = HealthStatus::Down;
                result
            }
            _ => base,
        }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, endpoint: &Endpoint) -> EndpointResult {
        if let Some(gate) = &self.options.readiness_gate {
            if let Err(e) = wait_until_ready(&endpoint.url, gate).await {
                let status = if endpoint.optional {
                    HealthStatus::Skipped
                } else {
                    HealthStatus::Down
                };
                return EndpointResult::new(endpoint, status).with_error(e.to_string());
            }
        }

        self.probe(endpoint).await
    }

    async fn check_all(&self, endpoints: &[Endpoint]) -> FanoutReport {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let handles: Vec<_> = endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let checker = self.clone();
                tokio::spawn(async move { checker.check(&endpoint).await })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let results: Vec<EndpointResult> = joined
            .into_iter()
            .zip(endpoints)
            .map(|(joined, endpoint)| {
                joined.unwrap_or_else(|e| {
                    EndpointResult::new(endpoint, HealthStatus::Down)
                        .with_error(format!("检测任务异常退出: {e}"))
                })
            })
            .collect();

        for result in &results {
            match result.status {
                HealthStatus::Up => info!(
                    "✓ {} ({}) - {:?} - {}ms",
                    result.name,
                    result.url,
                    result.status_code,
                    result.response_time_ms()
                ),
                HealthStatus::Down => warn!(
                    "✗ {} ({}) - {}",
                    result.name,
                    result.url,
                    result.error_message.as_deref().unwrap_or("未知错误")
                ),
                HealthStatus::Skipped => info!(
                    "- {} ({}) 已跳过: {}",
                    result.name,
                    result.url,
                    result.error_message.as_deref().unwrap_or("服务不可达")
                ),
            }
        }

        FanoutReport {
            results,
            started_at,
            elapsed: start_time.elapsed(),
        }
    }
}
