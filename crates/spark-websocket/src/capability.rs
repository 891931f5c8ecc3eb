//! 发布给调用方的能力契约。
//!
//! ## 意图（Why）
//! - 通用调用约定要求把 send/receive/close 三个能力连同元数据交给应用代码；这里用一个对象安全的
//!   trait 加一个强类型结构体表达，而不是字符串键的字典；
//! - 应用代码只依赖 [`WebSocketCapability`] 与 [`WebSocketEnvironment`]，与底层套接字实现解耦。
//!
//! ## 契约（What）
//! - [`WebSocketEnvironment`] 在适配器构造时一次性生成，此后只读；
//! - `version` 为协议版本字符串（默认 `"1.0"`）；
//! - `call_cancelled` 随连接生命周期结束而触发（见 `WebSocketAdapter::cleanup`）；
//! - `context` 是指向原始套接字上下文的不透明回溯引用，可按具体类型向下转型。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cancel::Cancellation;
use crate::error::Result;
use crate::frame::{Frame, ReceiveResult};

/// 通用调用约定下的三个能力。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `send`：操作码为 `0x8` 时改走关闭路径，其余数据帧原样转发；
///   - `receive`：读取一帧（或一段分片），关闭帧不携带字节数；
///   - `close`：半关闭输出方向，读方向仍可继续排空对端数据；
/// - **并发 (Trade-offs)**：允许一个 `send` 与一个 `receive` 并发；两个并发 `send`
///   （或两个并发 `receive`）属于调用方错误，实现不做串行化。
#[async_trait]
pub trait WebSocketCapability: Send + Sync {
    async fn send(
        &self,
        buffer: &[u8],
        opcode: u8,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<()>;

    async fn receive(&self, buffer: &mut [u8], cancel: &Cancellation) -> Result<ReceiveResult>;

    async fn close(&self, status: u16, description: &str, cancel: &Cancellation) -> Result<()>;

    /// 以 [`Frame`] 形式发送，语义与 [`send`](Self::send) 相同。
    async fn send_frame(&self, frame: &Frame, cancel: &Cancellation) -> Result<()> {
        self.send(&frame.payload, frame.opcode, frame.end_of_message, cancel)
            .await
    }
}

/// 发布给调用方的能力环境。
#[derive(Clone)]
pub struct WebSocketEnvironment {
    capability: Arc<dyn WebSocketCapability>,
    call_cancelled: Cancellation,
    version: Arc<str>,
    context: Arc<dyn Any + Send + Sync>,
}

impl WebSocketEnvironment {
    pub(crate) fn new(
        capability: Arc<dyn WebSocketCapability>,
        call_cancelled: Cancellation,
        version: &str,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            capability,
            call_cancelled,
            version: Arc::from(version),
            context,
        }
    }

    /// 三个能力的共享句柄，可脱离环境单独传递。
    pub fn capability(&self) -> Arc<dyn WebSocketCapability> {
        Arc::clone(&self.capability)
    }

    pub async fn send(
        &self,
        buffer: &[u8],
        opcode: u8,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<()> {
        self.capability
            .send(buffer, opcode, end_of_message, cancel)
            .await
    }

    pub async fn send_frame(&self, frame: &Frame, cancel: &Cancellation) -> Result<()> {
        self.capability.send_frame(frame, cancel).await
    }

    pub async fn receive(&self, buffer: &mut [u8], cancel: &Cancellation) -> Result<ReceiveResult> {
        self.capability.receive(buffer, cancel).await
    }

    pub async fn close(&self, status: u16, description: &str, cancel: &Cancellation) -> Result<()> {
        self.capability.close(status, description, cancel).await
    }

    /// 连接级取消信号；连接清理完成后触发。
    pub fn call_cancelled(&self) -> &Cancellation {
        &self.call_cancelled
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// 按具体类型取回原始套接字上下文；类型不匹配时返回 `None`。
    pub fn context<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.context).downcast::<T>().ok()
    }
}

impl fmt::Debug for WebSocketEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketEnvironment")
            .field("version", &self.version)
            .field("call_cancelled", &self.call_cancelled.is_cancelled())
            .finish_non_exhaustive()
    }
}
