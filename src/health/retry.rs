//! 重试策略
//!
//! 定义最大重试次数与退避时间表

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 退避时间表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    /// 指数退避：第 i 次重试前等待 `base * 2^(i-1)`
    Exponential {
        #[serde(with = "millis")]
        base: Duration,
    },
    /// 固定间隔
    Fixed {
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// 不等待
    None,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// 第 `retry` 次重试（从1开始）之前的等待时间
    ///
    /// `retry == 0` 表示首次尝试，永远不等待。
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        match self {
            Backoff::Exponential { base } => {
                // 指数封顶，避免移位溢出
                let shift = (retry - 1).min(30);
                base.saturating_mul(1u32 << shift)
            }
            Backoff::Fixed { delay } => *delay,
            Backoff::None => Duration::ZERO,
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大重试次数（总尝试次数为 `max_retries + 1`）
    pub max_retries: u32,
    /// 退避时间表
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// 创建使用默认指数退避的策略
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::default(),
        }
    }

    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::None,
        }
    }

    /// 替换退避时间表
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// 总尝试次数上限
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 第 `attempt` 次尝试（从1开始）之前的等待时间
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt.saturating_sub(1))
    }

    /// 所有重试累计的最长等待时间
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_attempts())
            .map(|attempt| self.delay_before_attempt(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Duration 以毫秒序列化
mod millis {
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
