//! 端口就绪等待
//!
//! 反复尝试与服务建立TCP连接，直到成功或超过截止时间。只判断端口是否在监听，
//! 不代表应用层健康。

use crate::error::{ProbeError, Result};
use reqwest::Url;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

/// 就绪等待参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOptions {
    /// 最长等待时间
    pub max_wait: Duration,
    /// 单次连接超时
    pub dial_timeout: Duration,
    /// 两次尝试之间的间隔
    pub poll_interval: Duration,
    /// 连接成功后的稳定等待
    pub settle_delay: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(25),
            dial_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(600),
            settle_delay: Duration::from_millis(250),
        }
    }
}

impl ReadinessOptions {
    /// 使用默认间隔，指定最长等待时间
    pub fn with_max_wait(max_wait: Duration) -> Self {
        Self {
            max_wait,
            ..Default::default()
        }
    }
}

/// 从基础URL中解析 `host:port`
///
/// 没有协议前缀时按 `http://` 处理，端口缺省时使用协议默认端口。
pub fn host_port(base: &str) -> Result<String> {
    let base = base.trim();
    let parsed = if base.contains("://") {
        Url::parse(base)
    } else {
        Url::parse(&format!("http://{base}"))
    }
    .map_err(|e| ProbeError::InvalidRequest(format!("无效的URL {base}: {e}")))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| ProbeError::InvalidRequest(format!("URL缺少主机名: {base}")))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| ProbeError::InvalidRequest(format!("无法确定端口: {base}")))?;

    Ok(format!("{host}:{port}"))
}

/// 等待服务端口可连接
///
/// # 参数
/// * `base` - 服务基础URL
/// * `options` - 等待参数
///
/// # 返回
/// * `Result<()>` - 就绪返回Ok；截止时间过后仍无法连接返回 `ProbeError::NotReady`
pub async fn wait_until_ready(base: &str, options: &ReadinessOptions) -> Result<()> {
    let address = host_port(base)?;
    let deadline = Instant::now() + options.max_wait;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_error = match timeout(options.dial_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                sleep(options.settle_delay).await;
                info!("服务 {} 已就绪（尝试 {} 次）", base, attempts);
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("连接 {address} 超时"),
            ),
        };

        if Instant::now() >= deadline {
            return Err(ProbeError::NotReady {
                base: base.to_string(),
                source: last_error,
            });
        }

        debug!("服务 {} 尚未就绪: {}", base, last_error);
        sleep(options.poll_interval).await;
    }
}
