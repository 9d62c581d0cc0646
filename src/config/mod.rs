//! 配置管理模块
//!
//! 提供环境变量配置、`.env` 文件加载以及TOML检测目标文件解析

pub mod env;
pub mod loader;
pub mod types;

// 重新导出主要类型
pub use env::load_dotenv;
pub use loader::{ConfigLoader, TomlConfigLoader};
pub use types::{validate_endpoints, ClientConfig, EndpointFile, ProbeConfig, ServiceBases};
