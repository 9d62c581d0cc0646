//! 带重试的HTTP请求客户端
//!
//! 对传输层错误（超时、连接失败）按指数退避重试；收到任何HTTP响应即返回，
//! 4xx/5xx 不重试，由调用方自行判断。

use crate::config::ClientConfig;
use crate::error::{ProbeError, Result};
use crate::health::result::RequestOutcome;
use crate::health::retry::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Request, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 内部调用鉴权请求头
pub const INTERNAL_API_KEY_HEADER: &str = "X-Internal-API-Key";

/// 一次探测请求的描述
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// HTTP方法（大小写不敏感）
    pub method: String,
    /// 目标URL
    pub url: String,
    /// 请求体
    pub body: Option<Vec<u8>>,
    /// 请求头，键统一为小写，同名后写覆盖先写
    pub headers: HashMap<String, String>,
    /// 单次请求超时，覆盖客户端默认值
    pub timeout: Option<Duration>,
    /// 重试策略，未设置时使用客户端默认策略
    pub retry: Option<RetryPolicy>,
}

impl ProbeRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: None,
            headers: HashMap::new(),
            timeout: None,
            retry: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 以JSON序列化请求体并设置 Content-Type
    pub fn with_json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(payload)?);
        Ok(self.with_header(CONTENT_TYPE.as_str(), "application/json"))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Self {
        self.headers.extend(
            headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone())),
        );
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        let policy = self.retry.unwrap_or_default();
        self.retry = Some(RetryPolicy {
            max_retries,
            ..policy
        });
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// 带重试的探测客户端
///
/// 内部的 `reqwest::Client` 持有连接池，克隆开销很小，应在进程启动时创建一次后到处传递。
#[derive(Debug, Clone)]
pub struct ProbeClient {
    /// HTTP客户端（共享连接池）
    client: Client,
    /// 默认重试策略
    retry: RetryPolicy,
    /// 附加到每个请求的请求头
    default_headers: Arc<HashMap<String, String>>,
}

impl ProbeClient {
    /// 按配置创建客户端
    ///
    /// # 参数
    /// * `config` - 连接池与超时配置
    ///
    /// # 返回
    /// * `Result<Self>` - 客户端实例
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent.clone());

        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::InvalidRequest(format!("HTTP客户端创建失败: {e}")))?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            default_headers: Arc::new(HashMap::new()),
        })
    }

    /// 设置默认重试策略
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 添加默认请求头
    pub fn with_default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.default_headers)
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// 配置了内部API密钥时附加 `X-Internal-API-Key`
    pub fn with_internal_api_key(self, key: Option<&str>) -> Self {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => self.with_default_header(INTERNAL_API_KEY_HEADER, key),
            None => self,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// 发送请求，传输层失败时按策略重试
    ///
    /// # 参数
    /// * `method` - HTTP方法
    /// * `url` - 目标URL
    /// * `body` - 请求体（可选）
    /// * `headers` - 请求头
    /// * `max_retries` - 最大重试次数
    ///
    /// # 返回
    /// * `Result<RequestOutcome>` - 最后一次收到的响应，或最后一次传输错误
    pub async fn request_with_retry(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
        headers: &HashMap<String, String>,
        max_retries: u32,
    ) -> Result<RequestOutcome> {
        let mut request = ProbeRequest::new(method, url)
            .with_headers(headers)
            .with_retry(RetryPolicy {
                max_retries,
                ..self.retry
            });
        request.body = body;
        self.execute(&request).await
    }

    pub async fn get(&self, url: &str, max_retries: u32) -> Result<RequestOutcome> {
        self.request_with_retry("GET", url, None, &HashMap::new(), max_retries)
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
        max_retries: u32,
    ) -> Result<RequestOutcome> {
        let request = ProbeRequest::new("POST", url)
            .with_json(payload)?
            .with_retry(RetryPolicy {
                max_retries,
                ..self.retry
            });
        self.execute(&request).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
        max_retries: u32,
    ) -> Result<RequestOutcome> {
        let request = ProbeRequest::new("PUT", url)
            .with_json(payload)?
            .with_retry(RetryPolicy {
                max_retries,
                ..self.retry
            });
        self.execute(&request).await
    }

    pub async fn delete(&self, url: &str, max_retries: u32) -> Result<RequestOutcome> {
        self.request_with_retry("DELETE", url, None, &HashMap::new(), max_retries)
            .await
    }

    /// 执行探测请求
    pub async fn execute(&self, probe: &ProbeRequest) -> Result<RequestOutcome> {
        let policy = probe.retry.unwrap_or(self.retry);
        let max_attempts = policy.max_attempts();
        let method = parse_method(&probe.method)?;
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let delay = policy.delay_before_attempt(attempt);
            if !delay.is_zero() {
                debug!("第 {} 次尝试前等待 {:?}: {}", attempt, delay, probe.url);
                tokio::time::sleep(delay).await;
            }

            // 请求构建失败属于不可恢复错误，直接返回
            let request = self.build_request(&method, probe)?;

            match self.send_once(request).await {
                Ok((status, headers, body)) => {
                    debug!(
                        "{} {} -> {} (第 {} 次尝试)",
                        method, probe.url, status, attempt
                    );
                    return Ok(RequestOutcome {
                        status,
                        headers,
                        body,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) if e.is_builder() => {
                    return Err(ProbeError::InvalidRequest(e.to_string()));
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(if e.is_timeout() {
                            ProbeError::Timeout {
                                url: probe.url.clone(),
                                attempts: attempt,
                                source: e,
                            }
                        } else {
                            ProbeError::Transport {
                                url: probe.url.clone(),
                                attempts: attempt,
                                source: e,
                            }
                        });
                    }

                    if e.is_timeout() {
                        warn!(
                            "{} {} 超时，准备重试 ({}/{})",
                            method, probe.url, attempt, max_attempts
                        );
                    } else {
                        warn!(
                            "{} {} 失败: {}，准备重试 ({}/{})",
                            method, probe.url, e, attempt, max_attempts
                        );
                    }
                }
            }
        }
    }

    /// 构建HTTP请求
    fn build_request(&self, method: &Method, probe: &ProbeRequest) -> Result<Request> {
        let mut builder = self
            .client
            .request(method.clone(), &probe.url)
            .headers(self.merge_headers(probe)?);

        if let Some(body) = &probe.body {
            builder = builder.body(body.clone());
        }

        if let Some(timeout) = probe.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| ProbeError::InvalidRequest(format!("{} {}: {}", method, probe.url, e)))
    }

    /// 合并默认请求头与请求自带的请求头，同名时以请求为准
    fn merge_headers(&self, probe: &ProbeRequest) -> Result<HeaderMap> {
        let mut merged = HeaderMap::new();
        for (key, value) in self.default_headers.iter().chain(probe.headers.iter()) {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ProbeError::InvalidRequest(format!("无效的请求头名称 {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::InvalidRequest(format!("无效的请求头 {key}: {e}")))?;
            merged.insert(name, value);
        }
        Ok(merged)
    }

    /// 发送一次请求并读取完整响应体
    async fn send_once(
        &self,
        request: Request,
    ) -> std::result::Result<(StatusCode, HeaderMap, Vec<u8>), reqwest::Error> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok((status, headers, body))
    }
}

/// 解析HTTP方法
fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.trim().to_uppercase().as_bytes())
        .map_err(|_| ProbeError::InvalidRequest(format!("无效的HTTP方法: {method}")))
}
