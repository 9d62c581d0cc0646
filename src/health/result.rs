//! 探测结果数据结构
//!
//! 定义探测目标、单次请求结果以及并发健康检测报告

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 探测目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// 名称
    pub name: String,
    /// 完整URL
    pub url: String,
    /// 可选服务：启动阶段不可达时跳过而不是失败
    #[serde(default)]
    pub optional: bool,
}

impl Endpoint {
    /// 创建探测目标
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            optional: false,
        }
    }

    /// 标记为可选服务
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// 一次成功完成的HTTP交互（无论状态码）
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// HTTP状态码
    pub status: StatusCode,
    /// 响应头
    pub headers: HeaderMap,
    /// 响应体
    pub body: Vec<u8>,
    /// 实际尝试次数
    pub attempts: u32,
    /// 总耗时（含退避等待）
    pub elapsed: Duration,
}

impl RequestOutcome {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 响应体按UTF-8宽松解码
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 将响应体解析为JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 返回200
    Up,
    /// 请求失败或状态码不符
    Down,
    /// 可选服务不可达，已跳过
    Skipped,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "正常"),
            HealthStatus::Down => write!(f, "异常"),
            HealthStatus::Skipped => write!(f, "跳过"),
        }
    }
}

impl HealthStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }

    /// 是否计入整体失败
    pub fn is_failure(&self) -> bool {
        matches!(self, HealthStatus::Down)
    }
}

/// 单个目标的检测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResult {
    /// 检测ID
    pub id: Uuid,
    /// 目标名称
    pub name: String,
    /// 目标URL
    pub url: String,
    /// 检测时间戳
    pub timestamp: DateTime<Utc>,
    /// 健康状态
    pub status: HealthStatus,
    /// HTTP状态码（如果收到响应）
    pub status_code: Option<u16>,
    /// 响应时间
    #[serde(with = "duration_serde")]
    pub response_time: Duration,
    /// 错误信息（如果有）
    pub error_message: Option<String>,
    /// 响应体中的 `message` 字段
    pub message: Option<String>,
}

impl EndpointResult {
    /// 创建新的检测结果
    pub fn new(endpoint: &Endpoint, status: HealthStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            timestamp: Utc::now(),
            status,
            status_code: None,
            response_time: Duration::ZERO,
            error_message: None,
            message: None,
        }
    }

    /// 设置HTTP状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// 设置响应时间
    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time = response_time;
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// 设置响应消息
    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// 获取响应时间（毫秒）
    pub fn response_time_ms(&self) -> u64 {
        self.response_time.as_millis() as u64
    }
}

/// 并发健康检测报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutReport {
    /// 各目标结果，顺序与输入一致
    pub results: Vec<EndpointResult>,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 总耗时
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl FanoutReport {
    /// 所有未跳过的目标都返回了200
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| !r.status.is_failure())
    }

    pub fn up_count(&self) -> usize {
        self.count(HealthStatus::Up)
    }

    pub fn down_count(&self) -> usize {
        self.count(HealthStatus::Down)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(HealthStatus::Skipped)
    }

    /// 失败的目标
    pub fn failures(&self) -> impl Iterator<Item = &EndpointResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }

    /// 按名称查找结果
    pub fn get(&self, name: &str) -> Option<&EndpointResult> {
        self.results.iter().find(|r| r.name == name)
    }

    fn count(&self, status: HealthStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: HealthStatus) -> EndpointResult {
        EndpointResult::new(&Endpoint::new(name, "http://localhost:1"), status)
    }

    fn report(results: Vec<EndpointResult>) -> FanoutReport {
        FanoutReport {
            results,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_report_passes_when_all_up() {
        let report = report(vec![
            result("a", HealthStatus::Up),
            result("b", HealthStatus::Up),
        ]);
        assert!(report.passed());
        assert_eq!(report.up_count(), 2);
    }

    #[test]
    fn test_single_failure_fails_report() {
        let report = report(vec![
            result("a", HealthStatus::Up),
            result("b", HealthStatus::Down),
        ]);
        assert!(!report.passed());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.failures().next().unwrap().name, "b");
    }

    #[test]
    fn test_skipped_does_not_fail_report() {
        let report = report(vec![
            result("a", HealthStatus::Up),
            result("b", HealthStatus::Skipped),
        ]);
        assert!(report.passed());
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_empty_report_passes() {
        assert!(report(vec![]).passed());
    }

    #[test]
    fn test_endpoint_result_serialization() {
        let r = result("svc", HealthStatus::Up)
            .with_status_code(200)
            .with_response_time(Duration::from_millis(42));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "up");
        assert_eq!(json["response_time"], 42);
        assert_eq!(json["status_code"], 200);
    }

    #[test]
    fn test_endpoint_optional_defaults_false() {
        let e: Endpoint = toml::from_str("name = \"a\"\nurl = \"http://x\"\n").unwrap();
        assert!(!e.optional);
        assert!(Endpoint::new("a", "http://x").optional().optional);
    }
}
