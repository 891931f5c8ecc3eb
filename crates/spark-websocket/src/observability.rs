//! 日志字段与订阅器安装。
//!
//! 适配层只通过 `tracing` 宏输出事件；是否落盘、输出格式由宿主决定。没有其他订阅器的
//! 进程（命令行工具、集成测试）可以调用 [`install_fmt_subscriber`] 获得默认的 fmt 输出。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 稳定的日志字段名。
///
/// `tracing` 宏的字段名只能写成字面量，这里的常量是它们的镜像，供下游检索与测试断言；
/// 修改适配层事件字段时须同步更新。
pub mod keys {
    pub const CONNECTION_ID: &str = "websocket.connection_id";
    pub const OPCODE: &str = "websocket.opcode";
    pub const STATE: &str = "websocket.state";
    pub const ACTION: &str = "websocket.action";
    pub const CLOSE_STATUS: &str = "websocket.close_status";
}

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// 安装 `fmt + EnvFilter` 订阅器，过滤规则取自 `RUST_LOG`，缺省为 `info`。
///
/// 多次调用只有第一次生效；若进程中已有其他全局订阅器，返回 `false` 且不做任何改动。
pub fn install_fmt_subscriber() -> bool {
    *INSTALLED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(build_env_filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    })
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 生成进程内唯一的连接标识，用于未显式配置 `connection_id` 的适配器。
pub(crate) fn next_connection_id() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("ws-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
