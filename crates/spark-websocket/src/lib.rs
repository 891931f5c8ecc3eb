#![deny(unsafe_code)]
#![doc = r#"
# spark-websocket

## 设计动机（Why）
- **定位**：把一个已经完成升级握手的原始全双工 WebSocket 桥接为协议无关的通用调用约定：
  send / receive / close 三个能力加上版本号、连接级取消信号与原始上下文的回溯引用。
- **要修复的不对称**：原始套接字的通用发送路径不允许发送关闭帧，而通用调用约定把关闭帧当作
  普通帧传递；适配层把这类调用改写为半关闭。
- **清理**：连接结束时根据套接字状态选择“无操作 / 完成握手 / 中止”，既不违反协议，也不会因
  排空对端数据而挂起。

## 核心契约（What）
- [`RawWebSocket`] / [`RawSocketContext`]：外部提供的原始套接字契约；
- [`WebSocketAdapter`]：包装一个原始套接字，实现 [`WebSocketCapability`]，发布
  [`WebSocketEnvironment`]，并提供 [`cleanup`](WebSocketAdapter::cleanup)；
- [`opcode`]：通用操作码 `{0x1, 0x2, 0x8}` 与原始 [`MessageType`] 的互译；
- [`AdapterError`]：协议/调用方错误与透传的传输错误。

## 实现策略（How）
- 每个能力调用是一次纯转换加一次原始套接字操作，取消通过 `tokio::select!` 注入；
- 适配层不启动任务、不持有处理循环，也不串行化并发调用；
- 日志通过 `tracing` 输出，字段名见 [`observability::keys`]。

## 风险与考量（Trade-offs）
- 同一适配器上两个并发 `send`（或 `receive`）属于调用方错误；
- 清理只读取一次状态，读取与动作之间不持锁，竞态统一收敛为幂等的中止。
"#]

mod adapter;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod error;
pub mod frame;
#[cfg(feature = "memory")]
pub mod memory;
pub mod observability;
pub mod opcode;
pub mod raw;
pub mod teardown;
mod util;

pub use adapter::{WebSocketAdapter, WebSocketAdapterBuilder};
pub use cancel::Cancellation;
pub use capability::{WebSocketCapability, WebSocketEnvironment};
pub use config::{AdapterConfig, ConfigError};
pub use error::{AdapterError, ErrorCategory, Result, SocketError, SocketErrorKind, SocketOperation};
pub use frame::{CloseFrame, Frame, NORMAL_CLOSURE, ReceiveResult};
#[cfg(feature = "memory")]
pub use memory::MemoryWebSocket;
pub use raw::{MessageType, RawReceiveResult, RawSocketContext, RawWebSocket, SocketContext, SocketState};
pub use teardown::TeardownAction;
