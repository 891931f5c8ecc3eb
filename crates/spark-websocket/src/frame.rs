//! 帧、关闭载荷与接收结果。
//!
//! ## 关闭载荷布局（What）
//! - 2 字节大端状态码，后接 UTF-8 原因文本，没有显式长度字段，以外层帧长度为界；
//! - 空载荷等价于“正常关闭（1000）+ 空原因”；
//! - 1 字节载荷无法表达状态码，判定为 [`AdapterError::InvalidCloseFrame`]。

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{AdapterError, Result};
use crate::opcode;

/// 正常关闭状态码。
pub const NORMAL_CLOSURE: u16 = 1000;

/// 一帧（或一段分片）：操作码 + 载荷 + 是否为消息最后一段。
///
/// 操作码只在消息首段有意义；适配层不跟踪分片状态，`end_of_message` 原样透传。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Bytes,
    pub end_of_message: bool,
}

impl Frame {
    pub fn new(opcode: u8, payload: impl Into<Bytes>, end_of_message: bool) -> Self {
        Self {
            opcode,
            payload: payload.into(),
            end_of_message,
        }
    }

    /// 完整的文本消息。
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(opcode::TEXT, Bytes::from(text.into()), true)
    }

    /// 完整的二进制消息。
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(opcode::BINARY, payload, true)
    }

    /// 以关闭帧形式编码的关闭请求。
    pub fn close(close: &CloseFrame) -> Self {
        Self::new(opcode::CLOSE, close.to_bytes(), true)
    }
}

/// 关闭帧载荷。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    pub status: u16,
    pub description: String,
}

impl CloseFrame {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }

    /// 正常关闭，原因为空。
    pub fn normal() -> Self {
        Self::new(NORMAL_CLOSURE, String::new())
    }

    /// 解析关闭载荷。
    ///
    /// 原因文本中的非法 UTF-8 序列以 U+FFFD 替换，而不是拒绝整帧：状态码才是关闭握手的
    /// 关键信息，原因只用于诊断。
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload {
            [] => Ok(Self::normal()),
            [_] => Err(AdapterError::InvalidCloseFrame { len: 1 }),
            [hi, lo, reason @ ..] => Ok(Self {
                status: u16::from_be_bytes([*hi, *lo]),
                description: String::from_utf8_lossy(reason).into_owned(),
            }),
        }
    }

    /// 编码为关闭载荷。
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.description.len());
        buf.put_u16(self.status);
        buf.put_slice(self.description.as_bytes());
        buf.freeze()
    }
}

/// 单次接收的结果。
///
/// # 教案式说明
/// - **意图 (Why)**：以带标签的枚举取代五元组，避免字段顺序错误；关闭帧的状态码与原因只存在于
///   `Close` 变体上，数据帧的字节数只存在于 `Text`/`Binary` 变体上。
/// - **契约 (What)**：`count()` 对关闭帧恒为 `None`，即使原始套接字报告了非零计数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiveResult {
    Text {
        end_of_message: bool,
        count: usize,
    },
    Binary {
        end_of_message: bool,
        count: usize,
    },
    Close {
        end_of_message: bool,
        status: Option<u16>,
        description: Option<String>,
    },
}

impl ReceiveResult {
    /// 通用操作码。
    pub fn opcode(&self) -> u8 {
        match self {
            ReceiveResult::Text { .. } => opcode::TEXT,
            ReceiveResult::Binary { .. } => opcode::BINARY,
            ReceiveResult::Close { .. } => opcode::CLOSE,
        }
    }

    pub fn end_of_message(&self) -> bool {
        match self {
            ReceiveResult::Text { end_of_message, .. }
            | ReceiveResult::Binary { end_of_message, .. }
            | ReceiveResult::Close { end_of_message, .. } => *end_of_message,
        }
    }

    /// 数据帧写入缓冲区的字节数；关闭帧返回 `None`。
    pub fn count(&self) -> Option<usize> {
        match self {
            ReceiveResult::Text { count, .. } | ReceiveResult::Binary { count, .. } => Some(*count),
            ReceiveResult::Close { .. } => None,
        }
    }

    pub fn close_status(&self) -> Option<u16> {
        match self {
            ReceiveResult::Close { status, .. } => *status,
            _ => None,
        }
    }

    pub fn close_description(&self) -> Option<&str> {
        match self {
            ReceiveResult::Close { description, .. } => description.as_deref(),
            _ => None,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, ReceiveResult::Close { .. })
    }
}
