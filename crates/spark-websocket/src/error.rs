//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两类失败：适配层自身判定的协议/调用方错误（[`AdapterError`] 的前三个变体），
//!   以及原始套接字上报的传输错误（[`SocketError`]，原样透传）；
//! - 与 `spark-transport-tcp` 一样，为每个错误提供稳定错误码（`spark.websocket.<语义>`），
//!   方便日志与告警按码聚合。
//!
//! ## 设计要求（What）
//! - 协议类错误不可重试，也不会被静默恢复；
//! - 传输错误不做任何包装之外的改写，调用方看到的 `code()`、`kind()` 与原始套接字一致。

use std::borrow::Cow;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::raw::SocketState;

/// 适配层统一返回别名。
pub type Result<T, E = AdapterError> = core::result::Result<T, E>;

pub(crate) const UNSUPPORTED_OPCODE_CODE: &str = "spark.websocket.unsupported_opcode";
pub(crate) const INVALID_CLOSE_FRAME_CODE: &str = "spark.websocket.invalid_close_frame";
pub(crate) const UNEXPECTED_STATE_CODE: &str = "spark.websocket.unexpected_state";

const CANCEL_CODE: &str = "spark.websocket.cancelled";
const TIMEOUT_CODE: &str = "spark.websocket.timeout";
const INVALID_STATE_CODE: &str = "spark.websocket.invalid_state";
const ABORTED_CODE: &str = "spark.websocket.connection_aborted";

/// 错误的处置分类，驱动上层决定是关闭连接、放弃本次调用还是记录告警。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 调用方或内部契约被违反；永不重试。
    Protocol,
    /// 底层连接失败。
    Transport,
    /// 调用方触发了取消信号。
    Cancelled,
    /// 操作超过了允许的时长。
    Timeout,
}

/// 原始套接字的操作种类，用于拼装错误码与文案。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketOperation {
    Send,
    Receive,
    CloseOutput,
}

impl SocketOperation {
    /// 面向日志的操作名称。
    pub fn label(self) -> &'static str {
        match self {
            SocketOperation::Send => "websocket send",
            SocketOperation::Receive => "websocket receive",
            SocketOperation::CloseOutput => "websocket close_output",
        }
    }

    fn failure_code(self) -> &'static str {
        match self {
            SocketOperation::Send => "spark.websocket.send_failed",
            SocketOperation::Receive => "spark.websocket.receive_failed",
            SocketOperation::CloseOutput => "spark.websocket.close_failed",
        }
    }
}

/// 传输错误的粗粒度种类。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketErrorKind {
    Cancelled,
    Timeout,
    /// 当前连接状态不允许该操作（例如在 `Closed` 之后继续发送）。
    InvalidState,
    /// 连接已被本端或对端中止。
    ConnectionAborted,
    Io,
    Other,
}

/// 原始套接字契约的错误类型。
///
/// # 教案式说明
/// - **意图 (Why)**：原始套接字由外部实现提供，需要一个足够通用、又能携带稳定错误码的
///   错误载体；结构参照 `spark-core` 的 `CoreError`：`'static` 错误码 + 人类可读文案 +
///   可选底层原因。
/// - **契约 (What)**：
///   - `code()` 始终返回稳定字符串，遵循 `<域>.<语义>` 约定；
///   - `kind()` 给出粗粒度分类，适配层据此映射 [`ErrorCategory`]；
///   - `source()` 暴露底层原因（若有）。
/// - **风险 (Trade-offs)**：底层原因以 `Box<dyn Error>` 保存，因此类型不实现 `Clone`；
///   测试中需要比较时请比较 `code()` 与 `kind()`。
#[derive(Debug)]
pub struct SocketError {
    code: &'static str,
    kind: SocketErrorKind,
    message: Cow<'static, str>,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl SocketError {
    /// 以显式错误码构造传输错误，供外部套接字实现使用。
    pub fn new(
        code: &'static str,
        kind: SocketErrorKind,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因。
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 构造取消错误。
    pub fn cancelled(op: SocketOperation) -> Self {
        Self::new(
            CANCEL_CODE,
            SocketErrorKind::Cancelled,
            format!("{} cancelled", op.label()),
        )
    }

    /// 构造超时错误。
    pub fn timeout(op: SocketOperation) -> Self {
        Self::new(
            TIMEOUT_CODE,
            SocketErrorKind::Timeout,
            format!("{} timed out", op.label()),
        )
    }

    /// 当前状态不允许该操作。
    pub fn invalid_state(op: SocketOperation, state: SocketState) -> Self {
        Self::new(
            INVALID_STATE_CODE,
            SocketErrorKind::InvalidState,
            format!("{} is not permitted in state {state:?}", op.label()),
        )
    }

    /// 连接已被中止。
    pub fn connection_aborted(op: SocketOperation) -> Self {
        Self::new(
            ABORTED_CODE,
            SocketErrorKind::ConnectionAborted,
            format!("{} failed: connection aborted", op.label()),
        )
    }

    /// 将 IO 错误映射为传输错误，保留原始错误作为 `source`。
    pub fn io(op: SocketOperation, error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::TimedOut => SocketErrorKind::Timeout,
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => SocketErrorKind::ConnectionAborted,
            _ => SocketErrorKind::Io,
        };
        let message = format!("{}: {error}", op.label());
        Self::new(op.failure_code(), kind, message).with_cause(error)
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn kind(&self) -> SocketErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 是否由取消信号触发。
    pub fn is_cancelled(&self) -> bool {
        self.kind == SocketErrorKind::Cancelled
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// 适配层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方只会收到三种结果之一：成功、透传的传输错误、或下列协议/调用方
///   错误；不存在“部分成功”。
/// - **契约 (What)**：
///   - `UnsupportedOpcode`：操作码不在 `{0x1, 0x2, 0x8}` 内；
///   - `InvalidCloseFrame`：关闭帧载荷只有 1 字节，无法承载状态码；
///   - `UnexpectedSocketState`：清理时观察到表外状态，属于内部一致性违例；
///   - `Transport`：原始套接字错误，`Display` 与 `source` 均透明转发。
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unsupported websocket opcode 0x{opcode:x}")]
    UnsupportedOpcode { opcode: u8 },

    #[error("close frame payload of {len} byte cannot carry a status code")]
    InvalidCloseFrame { len: usize },

    #[error("unexpected websocket state {state:?} during cleanup")]
    UnexpectedSocketState { state: SocketState },

    #[error(transparent)]
    Transport(#[from] SocketError),
}

impl AdapterError {
    /// 稳定错误码；传输错误返回原始套接字给出的码值。
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::UnsupportedOpcode { .. } => UNSUPPORTED_OPCODE_CODE,
            AdapterError::InvalidCloseFrame { .. } => INVALID_CLOSE_FRAME_CODE,
            AdapterError::UnexpectedSocketState { .. } => UNEXPECTED_STATE_CODE,
            AdapterError::Transport(err) => err.code(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AdapterError::UnsupportedOpcode { .. }
            | AdapterError::InvalidCloseFrame { .. }
            | AdapterError::UnexpectedSocketState { .. } => ErrorCategory::Protocol,
            AdapterError::Transport(err) => match err.kind() {
                SocketErrorKind::Cancelled => ErrorCategory::Cancelled,
                SocketErrorKind::Timeout => ErrorCategory::Timeout,
                _ => ErrorCategory::Transport,
            },
        }
    }

    /// 若为透传的传输错误，返回其引用。
    pub fn as_transport(&self) -> Option<&SocketError> {
        match self {
            AdapterError::Transport(err) => Some(err),
            _ => None,
        }
    }
}
