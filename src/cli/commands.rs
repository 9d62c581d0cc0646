//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{parse_headers, Args, Commands, OutputFormat};
use crate::config::{ConfigLoader, ProbeConfig, TomlConfigLoader};
use crate::error::{ProbeError, Result};
use crate::health::{
    wait_until_ready, CheckOptions, Endpoint, FanoutReport, HealthChecker, HealthStatus,
    HttpHealthChecker, ProbeClient, ProbeRequest, ReadinessOptions, RetryPolicy,
};
use crate::logging::LoggingSystem;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 命令执行上下文，启动时构建一次
pub struct AppContext {
    /// 生效的配置
    pub config: ProbeConfig,
    /// 共享的探测客户端
    pub client: ProbeClient,
    /// 日志系统
    pub logging: Option<LoggingSystem>,
}

impl AppContext {
    /// 根据配置创建上下文
    pub fn new(config: ProbeConfig, logging: Option<LoggingSystem>) -> Result<Self> {
        let client = ProbeClient::new(&config.client)?
            .with_retry(config.retry)
            .with_internal_api_key(config.internal_api_key.as_deref());
        Ok(Self {
            config,
            client,
            logging,
        })
    }
}

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    ///
    /// # 返回
    /// * `Result<bool>` - 命令是否成功（决定进程退出码）
    async fn execute(&self, args: &Args, context: &AppContext) -> Result<bool>;
}

/// 分发并执行命令
pub async fn execute_command(args: &Args, context: &AppContext) -> Result<bool> {
    match &args.command {
        Commands::Check { .. } => CheckCommand.execute(args, context).await,
        Commands::Request { .. } => RequestCommand.execute(args, context).await,
        Commands::Wait { .. } => WaitCommand.execute(args, context).await,
        Commands::Endpoints { .. } => EndpointsCommand.execute(args, context).await,
        Commands::Version { .. } => VersionCommand.execute(args, context).await,
    }
}

/// 确定检测目标：优先使用文件，否则使用环境变量中的服务地址
///
/// # 返回
/// * `Result<(Vec<Endpoint>, Option<RetryPolicy>)>` - 检测目标和文件中的重试策略
pub async fn resolve_endpoints(
    file: Option<&Path>,
    config: &ProbeConfig,
) -> Result<(Vec<Endpoint>, Option<RetryPolicy>)> {
    match file {
        Some(path) => {
            let loader = TomlConfigLoader::new(true);
            let loaded = loader.load_from_file(path).await?;
            Ok((loaded.endpoints, loaded.retry))
        }
        None => Ok((config.services.default_endpoints(), None)),
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args, _context: &AppContext) -> Result<bool> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                _ => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(true)
    }
}

/// 并发检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args, context: &AppContext) -> Result<bool> {
        if let Commands::Check {
            file,
            format,
            timeout,
            retries,
            require_json,
            ready_wait,
        } = &args.command
        {
            let (endpoints, file_retry) = resolve_endpoints(file.as_deref(), &context.config).await?;

            let retry = file_retry.unwrap_or(RetryPolicy {
                max_retries: *retries,
                ..context.config.retry
            });
            let options = CheckOptions {
                timeout: Duration::from_secs(*timeout),
                retry,
                require_json: *require_json,
                readiness_gate: ready_wait.map(|secs| ReadinessOptions {
                    max_wait: Duration::from_secs(secs),
                    ..context.config.readiness
                }),
            };

            if matches!(format, OutputFormat::Text) {
                println!("开始健康检测（{} 个目标）...", endpoints.len());
            }

            let checker = HttpHealthChecker::new(context.client.clone(), options);
            let report = checker.check_all(&endpoints).await;

            if let Some(logging) = &context.logging {
                logging.report_log(&report);
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => print_table_results(&report),
                OutputFormat::Text => print_text_results(&report),
            }

            Ok(report.passed())
        } else {
            Ok(true)
        }
    }
}

/// 打印文本格式结果
fn print_text_results(report: &FanoutReport) {
    for result in &report.results {
        let status_icon = match result.status {
            HealthStatus::Up => "✓",
            HealthStatus::Down => "✗",
            HealthStatus::Skipped => "-",
        };
        println!(
            "{} {} ({}) - {} - {}ms",
            status_icon,
            result.name,
            result.url,
            result.status,
            result.response_time_ms()
        );

        if let Some(message) = &result.message {
            println!("  消息: {message}");
        }
        if let Some(error) = &result.error_message {
            println!("  错误: {error}");
        }
    }

    println!(
        "\n{}：{} 正常，{} 异常，{} 跳过，耗时 {}ms",
        if report.passed() { "通过" } else { "失败" },
        report.up_count(),
        report.down_count(),
        report.skipped_count(),
        report.elapsed.as_millis()
    );
}

/// 打印表格格式结果
fn print_table_results(report: &FanoutReport) {
    println!(
        "{:<30} {:<10} {:<10} {:<10} {:<30}",
        "服务名称", "状态", "状态码", "响应时间", "错误信息"
    );
    println!("{}", "-".repeat(95));

    for result in &report.results {
        let status_code = result
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        println!(
            "{:<30} {:<10} {:<10} {:<10} {:<30}",
            result.name,
            result.status.to_string(),
            status_code,
            format!("{}ms", result.response_time_ms()),
            result.error_message.as_deref().unwrap_or("")
        );
    }
}

/// 单次请求命令
pub struct RequestCommand;

#[async_trait]
impl Command for RequestCommand {
    async fn execute(&self, args: &Args, context: &AppContext) -> Result<bool> {
        if let Commands::Request {
            method,
            url,
            data,
            headers,
            retries,
            timeout,
        } = &args.command
        {
            let headers = parse_headers(headers).map_err(ProbeError::InvalidRequest)?;

            let mut request = ProbeRequest::new(method, url).with_headers(&headers);
            if let Some(data) = data {
                let payload: serde_json::Value = serde_json::from_str(data)?;
                request = request.with_json(&payload)?;
            }
            if let Some(retries) = retries {
                request = request.with_retry(RetryPolicy {
                    max_retries: *retries,
                    ..context.client.retry_policy()
                });
            }
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(*secs));
            }

            let outcome = context.client.execute(&request).await?;

            println!(
                "HTTP {} {}（尝试 {} 次，耗时 {}ms）",
                outcome.status.as_u16(),
                outcome.status.canonical_reason().unwrap_or(""),
                outcome.attempts,
                outcome.elapsed.as_millis()
            );
            match outcome.json() {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", outcome.text()),
            }

            Ok(outcome.is_success())
        } else {
            Ok(true)
        }
    }
}

/// 端口就绪等待命令
pub struct WaitCommand;

#[async_trait]
impl Command for WaitCommand {
    async fn execute(&self, args: &Args, context: &AppContext) -> Result<bool> {
        if let Commands::Wait { base, max_wait } = &args.command {
            let options = match max_wait {
                Some(secs) => ReadinessOptions {
                    max_wait: Duration::from_secs(*secs),
                    ..context.config.readiness
                },
                None => context.config.readiness,
            };

            wait_until_ready(base, &options).await?;
            println!("✓ {base} 已就绪");
        }
        Ok(true)
    }
}

/// 检测目标列表命令
pub struct EndpointsCommand;

#[async_trait]
impl Command for EndpointsCommand {
    async fn execute(&self, args: &Args, context: &AppContext) -> Result<bool> {
        if let Commands::Endpoints { file, format } = &args.command {
            let (endpoints, _) = resolve_endpoints(file.as_deref(), &context.config).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&endpoints)?),
                _ => {
                    for endpoint in &endpoints {
                        let marker = if endpoint.optional { "（可选）" } else { "" };
                        println!("{:<30} {}{}", endpoint.name, endpoint.url, marker);
                    }
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn context() -> AppContext {
        AppContext::new(ProbeConfig::default(), None).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_default_endpoints() {
        let config = ProbeConfig::default();
        let (endpoints, retry) = resolve_endpoints(None, &config).await.unwrap();
        assert_eq!(endpoints, config.services.default_endpoints());
        assert!(retry.is_none());
    }

    #[tokio::test]
    async fn test_resolve_endpoints_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[endpoints]]\nname = \"only\"\nurl = \"http://localhost:1\"").unwrap();

        let (endpoints, _) = resolve_endpoints(Some(file.path()), &ProbeConfig::default())
            .await
            .unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "only");
    }

    #[tokio::test]
    async fn test_check_command_against_mock() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"message": "running"}"#)
            .create_async()
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[endpoints]]\nname = \"mock\"\nurl = \"{}/health\"",
            server.url()
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = Args::try_parse_from([
            "service-probe",
            "check",
            "--file",
            path.as_str(),
            "--format",
            "json",
        ])
        .unwrap();

        let passed = execute_command(&args, &context()).await.unwrap();
        assert!(passed);
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_command_reports_http_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/tasks/1")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/tasks/1", server.url());
        let args = Args::try_parse_from(["service-probe", "request", "delete", url.as_str()])
            .unwrap();

        let success = execute_command(&args, &context()).await.unwrap();
        assert!(!success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_command_rejects_invalid_json_body() {
        let args = Args::try_parse_from([
            "service-probe",
            "request",
            "post",
            "http://localhost:1/x",
            "-d",
            "{not json",
        ])
        .unwrap();

        let result = execute_command(&args, &context()).await;
        assert!(matches!(result, Err(ProbeError::Json(_))));
    }
}
