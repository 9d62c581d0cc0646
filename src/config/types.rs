//! 配置数据结构定义
//!
//! 定义HTTP客户端、服务地址和探测参数的配置结构体及验证逻辑

use crate::health::{Endpoint, ReadinessOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// HTTP客户端配置（进程内共享一个连接池）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 请求超时时间
    pub request_timeout: Duration,
    /// 连接超时时间
    pub connect_timeout: Option<Duration>,
    /// 每个主机保留的最大空闲连接数
    pub pool_max_idle_per_host: usize,
    /// 空闲连接保留时间
    pub pool_idle_timeout: Duration,
    /// User-Agent
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: None,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        }
    }
}

/// 各服务的基础地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBases {
    pub project: String,
    pub schedule: String,
    pub task: String,
    pub user: String,
    pub manage_task: String,
    pub manage_project: String,
    pub notify_user: String,
    /// API网关
    pub gateway: String,
}

impl Default for ServiceBases {
    fn default() -> Self {
        Self {
            project: "http://localhost:5200".to_string(),
            schedule: "http://localhost:5300".to_string(),
            task: "http://localhost:5500".to_string(),
            user: "http://localhost:5100".to_string(),
            manage_task: "http://localhost:4000".to_string(),
            manage_project: "http://localhost:4100".to_string(),
            notify_user: "http://localhost:4500".to_string(),
            gateway: "http://localhost:8000".to_string(),
        }
    }
}

impl ServiceBases {
    /// 默认检测目标：各服务直连地址加上网关路由
    ///
    /// manage-project 和 notify-user 不一定随整套环境部署，标记为可选。
    pub fn default_endpoints(&self) -> Vec<Endpoint> {
        let gateway = self.gateway.trim_end_matches('/');
        vec![
            Endpoint::new("Project Service", &self.project),
            Endpoint::new("Schedule Service", &self.schedule),
            Endpoint::new("Tasks Service", &self.task),
            Endpoint::new("User Service", &self.user),
            Endpoint::new("Manage-Task Service", &self.manage_task),
            Endpoint::new("Manage-Project Service", &self.manage_project).optional(),
            Endpoint::new("Notify-User Service", &self.notify_user).optional(),
            Endpoint::new("API Gateway - Project", format!("{gateway}/project")),
            Endpoint::new("API Gateway - Schedule", format!("{gateway}/schedule")),
            Endpoint::new("API Gateway - Tasks", format!("{gateway}/tasks")),
            Endpoint::new("API Gateway - User", format!("{gateway}/user")),
            Endpoint::new("API Gateway - Manage-Task", format!("{gateway}/manage-task")),
        ]
    }
}

/// 探测工具的完整配置，启动时构建一次
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// HTTP客户端配置
    pub client: ClientConfig,
    /// 默认重试策略
    pub retry: RetryPolicy,
    /// 服务地址
    pub services: ServiceBases,
    /// 内部调用密钥
    pub internal_api_key: Option<String>,
    /// 就绪等待参数
    pub readiness: ReadinessOptions,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            retry: RetryPolicy::default(),
            services: ServiceBases::default(),
            internal_api_key: None,
            readiness: ReadinessOptions::default(),
        }
    }
}

/// TOML检测目标文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointFile {
    /// 检测目标列表
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// 覆盖默认重试策略
    pub retry: Option<RetryPolicy>,
}

/// 检测目标验证函数
///
/// # 参数
/// * `endpoints` - 要验证的目标列表
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_endpoints(endpoints: &[Endpoint]) -> Result<(), String> {
    if endpoints.is_empty() {
        return Err("至少需要配置一个检测目标".to_string());
    }

    let mut names = HashSet::new();
    for endpoint in endpoints {
        if endpoint.name.trim().is_empty() {
            return Err("检测目标名称不能为空".to_string());
        }

        if !endpoint.url.starts_with("http://") && !endpoint.url.starts_with("https://") {
            return Err(format!("检测目标 {} 的URL格式无效", endpoint.name));
        }

        if !names.insert(endpoint.name.as_str()) {
            return Err(format!("检测目标名称重复: {}", endpoint.name));
        }
    }

    Ok(())
}
