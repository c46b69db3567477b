//! 可观测性：tracing 订阅器初始化
//!
//! 日志级别由 RUST_LOG 控制，未设置时为 info。重复调用不会 panic（测试里可多次初始化）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
