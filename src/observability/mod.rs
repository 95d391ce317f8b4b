//! 可观测性：tracing 订阅器初始化
//!
//! 日志写到 stderr（stdout 留给 CLI 的 JSON 事件流）；默认 info，可通过 RUST_LOG 覆盖。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with("info");
}

/// 用给定默认指令初始化；重复调用无副作用
pub fn init_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
