use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use imagebatch::app::Application;
use imagebatch::shutdown::{wait_for_shutdown_signal, ShutdownManager};
use imagebatch_core::{init_logging, AppConfig};
use tokio::time::Instant;
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

fn cli() -> Command {
    Command::new("imagebatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Feed图片批处理系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("serve").about("启动HTTP服务，等待批次触发请求"))
        .subcommand(
            Command::new("run")
                .about("在当前进程内执行一个批次")
                .arg(
                    Arg::new("start-row")
                        .long("start-row")
                        .value_name("ROW")
                        .value_parser(clap::value_parser!(i64))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("end-row")
                        .long("end-row")
                        .value_name("ROW")
                        .value_parser(clap::value_parser!(i64))
                        .required(true),
                )
                .arg(
                    Arg::new("schedule-id")
                        .long("schedule-id")
                        .value_name("ID"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).context("加载配置失败")?;

    // 命令行参数优先于配置文件
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动Feed图片批处理系统");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    match matches.subcommand() {
        Some(("serve", _)) => serve(config).await,
        Some(("run", args)) => run_once(config, args).await,
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    if !config.api.enabled {
        return Err(anyhow::anyhow!("API服务被禁用，请检查配置"));
    }

    let app = std::sync::Arc::new(Application::new(config).await?);
    let shutdown_manager = ShutdownManager::new();

    let server = {
        let app = app.clone();
        let shutdown_rx = shutdown_manager.subscribe();
        tokio::spawn(async move {
            if let Err(e) = app.serve(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    match tokio::time::timeout_at(deadline, server).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }
    app.drain_batches(deadline.saturating_duration_since(Instant::now())).await;

    app.close().await;
    info!("Feed图片批处理系统已退出");
    Ok(())
}

async fn run_once(config: AppConfig, args: &ArgMatches) -> Result<()> {
    let start_row = args.get_one::<i64>("start-row").copied().unwrap_or(0);
    let end_row = args
        .get_one::<i64>("end-row")
        .copied()
        .context("缺少 --end-row 参数")?;
    let schedule_id = args.get_one::<String>("schedule-id").cloned();

    let app = Application::new(config).await?;
    let batch = app.run_batch(schedule_id, start_row, end_row).await;
    app.close().await;

    let batch = batch?;
    match &batch.error {
        Some(err) => warn!(batch_id = batch.id, "批次结束，最后错误: {err}"),
        None => info!(batch_id = batch.id, "批次成功结束"),
    }
    Ok(())
}
