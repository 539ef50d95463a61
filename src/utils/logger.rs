use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 終端機用的精簡文字
    Text,
    /// 容器環境的 JSON 行
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// RUST_LOG 未設定時的預設過濾
pub fn default_directives(format: LogFormat, verbose: bool) -> &'static str {
    match (format, verbose) {
        (LogFormat::Text, false) => "visa_exhibit_generator=info",
        (LogFormat::Text, true) => "visa_exhibit_generator=debug,info",
        (LogFormat::Json, false) => "visa_exhibit_generator=info,tower_http=info",
        (LogFormat::Json, true) => "visa_exhibit_generator=debug,tower_http=debug,info",
    }
}

/// 依 LOG_FORMAT 選擇輸出格式並安裝全域 subscriber
pub fn init_logger(log_format: &str, verbose: bool) {
    let format = LogFormat::parse(log_format);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(format, verbose)));

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(layer.json()).init(),
        LogFormat::Text => registry.with(layer.compact()).init(),
    }
}
