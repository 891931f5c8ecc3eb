//! 连接清理状态机。
//!
//! ## 状态表（What）
//! | 观察到的状态 | 动作 |
//! |---|---|
//! | `Closed` / `Aborted` | 无（已处于终态） |
//! | `CloseReceived` | 以正常关闭回应，完成握手 |
//! | `Open` | 中止：从未协商关闭，避免排空无界的对端数据 |
//! | `CloseSent` | 中止：关闭未获确认，不再等待 |
//! | 其他 | [`AdapterError::UnexpectedSocketState`] |
//!
//! 状态只读取一次，读取与动作之间不持锁；若对端在此期间改变状态，动作要么是幂等的中止，
//! 要么是会失败并回退为中止的关闭，绝不会挂起。

use crate::error::{AdapterError, Result};
use crate::raw::SocketState;

/// 清理时采取的动作。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TeardownAction {
    /// 无需任何操作。
    None,
    /// 发送正常关闭以完成对端发起的握手。
    CompleteClose,
    /// 立即中止连接。
    Abort,
}

impl TeardownAction {
    /// 根据观察到的状态选择动作。
    pub fn for_state(state: SocketState) -> Result<Self> {
        match state {
            SocketState::Closed | SocketState::Aborted => Ok(TeardownAction::None),
            SocketState::CloseReceived => Ok(TeardownAction::CompleteClose),
            SocketState::Open | SocketState::CloseSent => Ok(TeardownAction::Abort),
            SocketState::None | SocketState::Connecting => {
                Err(AdapterError::UnexpectedSocketState { state })
            }
        }
    }

    /// 日志中的动作名称。
    pub fn label(self) -> &'static str {
        match self {
            TeardownAction::None => "none",
            TeardownAction::CompleteClose => "complete_close",
            TeardownAction::Abort => "abort",
        }
    }
}
