//! 错误处理模块
//!
//! 定义探测工具的统一错误类型

use thiserror::Error;

/// Service Probe 的主要错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 请求构建失败（无效的方法或URL），不会重试
    #[error("无效的请求: {0}")]
    InvalidRequest(String),

    /// 所有尝试均超时
    #[error("请求超时: {url}（共尝试 {attempts} 次）")]
    Timeout {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// 所有尝试均发生传输层错误
    #[error("请求失败: {url}（共尝试 {attempts} 次）: {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// 服务端口在截止时间内未就绪
    #[error("服务 {base} 未就绪: {source}")]
    NotReady {
        base: String,
        #[source]
        source: std::io::Error,
    },

    /// 响应体不是合法的JSON对象
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// 获取最终的尝试次数（仅对重试耗尽的错误有意义）
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ProbeError::Timeout { attempts, .. } | ProbeError::Transport { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// 是否为传输层错误（超时或连接失败）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProbeError::Timeout { .. } | ProbeError::Transport { .. }
        )
    }
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },

    /// 环境变量取值无效
    #[error("环境变量 {key} 的值无效: {value}")]
    InvalidValue { key: String, value: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ProbeError>;
