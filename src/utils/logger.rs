use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日誌輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    /// 排程器 (cron / k8s CronJob) 收集日誌時使用
    Json,
}

/// `RUST_LOG` wins; otherwise the crate logs at info, or debug when verbose.
fn batch_filter(verbose: bool) -> EnvFilter {
    let directive = if verbose {
        "db_csv_batch=debug,info"
    } else {
        "db_csv_batch=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

pub fn init_logger(format: LogFormat, verbose: bool) {
    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let registry = tracing_subscriber::registry().with(batch_filter(verbose));

    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}

pub fn init_cli_logger(verbose: bool) {
    init_logger(LogFormat::Compact, verbose);
}

pub fn init_json_logger(verbose: bool) {
    init_logger(LogFormat::Json, verbose);
}
