//! 环境变量配置
//!
//! 启动时从环境变量构建 `ProbeConfig`，每个键都有缺省值。

use crate::config::types::ProbeConfig;
use crate::error::{ConfigError, Result};
use crate::health::RetryPolicy;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const PROJECT_BASE: &str = "PROJECT_BASE";
pub const SCHEDULE_BASE: &str = "SCHEDULE_BASE";
pub const TASK_BASE: &str = "TASK_BASE";
pub const USER_BASE: &str = "USER_BASE";
pub const MANAGE_TASK_BASE: &str = "MANAGE_TASK_BASE";
pub const MANAGE_PROJECT_BASE: &str = "MANAGE_PROJECT_BASE";
pub const NOTIFY_USER_BASE: &str = "NOTIFY_USER_BASE";
pub const GATEWAY_BASE: &str = "GATEWAY_BASE";
pub const INTERNAL_API_KEY: &str = "INTERNAL_API_KEY";
pub const PROBE_MAX_RETRIES: &str = "PROBE_MAX_RETRIES";
pub const PROBE_TIMEOUT_SECS: &str = "PROBE_TIMEOUT_SECS";
pub const PROBE_READY_WAIT_SECS: &str = "PROBE_READY_WAIT_SECS";

/// 加载 `.env.local` 和 `.env`（存在时）
///
/// 已存在的环境变量不会被覆盖，因此 `.env.local` 优先于 `.env`。
pub fn load_dotenv() {
    for file in [".env.local", ".env"] {
        if Path::new(file).exists() {
            match dotenv::from_filename(file) {
                Ok(_) => debug!("已加载环境文件 {}", file),
                Err(e) => debug!("加载环境文件 {} 失败: {}", file, e),
            }
        }
    }
}

impl ProbeConfig {
    /// 从进程环境变量构建配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过查找函数构建配置，空白值视为未设置
    ///
    /// # 参数
    /// * `lookup` - 按键名返回取值
    ///
    /// # 返回
    /// * `Result<Self>` - 配置或取值无效的错误
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = ProbeConfig::default();

        let services = &mut config.services;
        for (key, slot) in [
            (PROJECT_BASE, &mut services.project),
            (SCHEDULE_BASE, &mut services.schedule),
            (TASK_BASE, &mut services.task),
            (USER_BASE, &mut services.user),
            (MANAGE_TASK_BASE, &mut services.manage_task),
            (MANAGE_PROJECT_BASE, &mut services.manage_project),
            (NOTIFY_USER_BASE, &mut services.notify_user),
            (GATEWAY_BASE, &mut services.gateway),
        ] {
            if let Some(value) = get(key) {
                *slot = value;
            }
        }

        config.internal_api_key = get(INTERNAL_API_KEY);

        if let Some(retries) = parse_value::<u32>(PROBE_MAX_RETRIES, get(PROBE_MAX_RETRIES))? {
            config.retry = RetryPolicy {
                max_retries: retries,
                ..config.retry
            };
        }

        if let Some(secs) = parse_value::<u64>(PROBE_TIMEOUT_SECS, get(PROBE_TIMEOUT_SECS))? {
            if secs == 0 {
                return Err(invalid(PROBE_TIMEOUT_SECS, "0"));
            }
            config.client.request_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_value::<u64>(PROBE_READY_WAIT_SECS, get(PROBE_READY_WAIT_SECS))? {
            config.readiness.max_wait = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| v.parse::<T>().map_err(|_| invalid(key, &v)))
        .transpose()
}

fn invalid(key: &str, value: &str) -> crate::error::ProbeError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}
