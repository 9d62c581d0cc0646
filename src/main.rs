//! Service Probe 主程序入口
//!
//! 带重试的HTTP探测工具

use anyhow::{Context, Result};
use clap::Parser;
use service_probe::cli::{execute_command, AppContext, Args};
use service_probe::config::{self, ProbeConfig};
use service_probe::logging::{LogConfig, LoggingSystem};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    // 先加载 .env，使其中的变量也能作为命令行参数的缺省值
    config::load_dotenv();

    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: if args.verbose {
            log::LevelFilter::Debug
        } else {
            args.log_level.clone().into()
        },
        json_format: args.json_logs,
        file_path: args.log_file.clone(),
        console: args.log_file.is_none(),
        ..Default::default()
    };
    let logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    debug!("Service Probe v{} 启动", service_probe::VERSION);

    // 加载环境变量配置
    let probe_config = ProbeConfig::from_env().context("加载环境变量配置失败")?;
    if args.is_verbose() {
        debug!("生效配置: {:?}", probe_config);
    }

    let context =
        AppContext::new(probe_config, Some(logging_system)).context("创建HTTP客户端失败")?;

    match execute_command(&args, &context).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("命令执行失败: {}", e);
            std::process::exit(1);
        }
    }
}
