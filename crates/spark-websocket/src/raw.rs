//! 原始套接字契约。
//!
//! ## 意图（Why）
//! - 适配层只依赖一个已经完成握手的全双工 WebSocket：本模块把它描述为对象安全的异步 trait，
//!   具体实现（Tokio、Hyper 升级连接、进程内回环等）由外部提供；
//! - 与 `spark-transport` 的 `TransportListener` 一样，契约只规定读写/半关闭/中止与状态查询，
//!   不关心底层 IO 细节。
//!
//! ## 契约（What）
//! - `send`：发送一帧（或一段分片），`message_type` 只允许数据帧；实现应拒绝 `Close`；
//! - `receive`：把一帧（或一段分片）读入调用方缓冲区；
//! - `close_output`：半关闭，只发送关闭帧，不关闭读方向；
//! - `abort`：立即中止，必须幂等；
//! - `state`：当前连接状态，由实现维护，适配层只读。

use async_trait::async_trait;

use crate::cancel::Cancellation;
use crate::error::SocketError;

/// 原始套接字的消息类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Text,
    Binary,
    Close,
}

/// 原始套接字的连接状态。
///
/// `None` 与 `Connecting` 只会出现在握手完成之前；适配层若在清理时观察到它们，
/// 视为内部一致性违例。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketState {
    None,
    Connecting,
    Open,
    /// 本端已发送关闭帧，尚未收到对端确认。
    CloseSent,
    /// 已收到对端关闭帧，本端尚未回应。
    CloseReceived,
    Closed,
    Aborted,
}

impl SocketState {
    /// 是否已处于终态。
    pub fn is_terminal(self) -> bool {
        matches!(self, SocketState::Closed | SocketState::Aborted)
    }
}

/// 原始套接字单次接收的结果。
///
/// `count` 为写入缓冲区的字节数；关闭帧的状态码与描述仅在 `message_type == Close` 时有意义。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawReceiveResult {
    pub message_type: MessageType,
    pub end_of_message: bool,
    pub count: usize,
    pub close_status: Option<u16>,
    pub close_description: Option<String>,
}

impl RawReceiveResult {
    /// 构造数据帧结果。
    pub fn data(message_type: MessageType, count: usize, end_of_message: bool) -> Self {
        Self {
            message_type,
            end_of_message,
            count,
            close_status: None,
            close_description: None,
        }
    }

    /// 构造关闭帧结果。
    pub fn close(status: Option<u16>, description: Option<String>) -> Self {
        Self {
            message_type: MessageType::Close,
            end_of_message: true,
            count: 0,
            close_status: status,
            close_description: description,
        }
    }
}

/// 已建立的全双工 WebSocket。
///
/// # 教案式说明
/// - **意图 (Why)**：把外部套接字实现收敛到一个最小接口，适配层与测试桩都面向它编程；
/// - **契约 (What)**：
///   - 所有异步方法都接受取消信号，信号触发后应尽快以取消错误返回；
///   - 同一实例上允许一个 `send` 与一个 `receive` 并发，两个并发 `send`（或 `receive`）属于调用方错误；
///   - `abort` 对非终态连接总是安全的，对终态连接是空操作；
/// - **风险 (Trade-offs)**：`state` 没有锁语义，读取后状态可能立即被对端改变。
#[async_trait]
pub trait RawWebSocket: Send + Sync + 'static {
    async fn send(
        &self,
        buffer: &[u8],
        message_type: MessageType,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<(), SocketError>;

    async fn receive(
        &self,
        buffer: &mut [u8],
        cancel: &Cancellation,
    ) -> Result<RawReceiveResult, SocketError>;

    async fn close_output(
        &self,
        status: u16,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<(), SocketError>;

    fn abort(&self);

    fn state(&self) -> SocketState;
}

/// 承载原始套接字的上下文，对应升级请求完成后由宿主构造的对象。
///
/// 适配层通过 [`socket`](Self::socket) 取得套接字，并把整个上下文作为不透明的回溯引用
/// 发布给高级调用方。
pub trait RawSocketContext: Send + Sync + 'static {
    type Socket: RawWebSocket;

    fn socket(&self) -> &Self::Socket;
}

/// 最简单的上下文：只持有套接字与可选的子协议。
#[derive(Debug)]
pub struct SocketContext<S> {
    socket: S,
    sub_protocol: Option<String>,
}

impl<S: RawWebSocket> SocketContext<S> {
    pub fn new(socket: S) -> Self {
        Self {
            socket,
            sub_protocol: None,
        }
    }

    /// 记录握手协商出的子协议。
    pub fn with_sub_protocol(mut self, sub_protocol: impl Into<String>) -> Self {
        self.sub_protocol = Some(sub_protocol.into());
        self
    }

    pub fn sub_protocol(&self) -> Option<&str> {
        self.sub_protocol.as_deref()
    }
}

impl<S: RawWebSocket> RawSocketContext for SocketContext<S> {
    type Socket = S;

    fn socket(&self) -> &S {
        &self.socket
    }
}
