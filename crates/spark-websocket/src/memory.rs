//! 进程内回环 WebSocket。
//!
//! ## 意图（Why）
//! - 原始套接字由外部提供，但适配层的关闭握手与清理逻辑需要一个遵循真实状态机的对端才能
//!   端到端验证；本模块以两条 Tokio 通道拼出一对互联的套接字；
//! - 下游在编写基于能力环境的业务测试时也可直接复用，无需真实网络。
//!
//! ## 状态机（What）
//! - 发出关闭：`Open → CloseSent`，`CloseReceived → Closed`；
//! - 收到关闭：`Open → CloseReceived`，`CloseSent → Closed`；
//! - `abort`：非终态进入 `Aborted`，并通知对端；对端在下一次 `receive` 时进入 `Aborted`；
//! - 对端被丢弃视同中止。
//!
//! ## 注意事项（Trade-offs）
//! - 通道无界，`send` 从不因背压阻塞；
//! - 缓冲区小于消息时按分片返回，剩余部分在下一次 `receive` 中继续交付。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::cancel::Cancellation;
use crate::error::{SocketError, SocketErrorKind, SocketOperation};
use crate::raw::{MessageType, RawReceiveResult, RawWebSocket, SocketState};

const CLOSE_VIA_SEND_CODE: &str = "spark.websocket.memory.close_via_send";

#[derive(Debug)]
enum WireMessage {
    Data {
        message_type: MessageType,
        payload: Bytes,
        end_of_message: bool,
    },
    Close {
        status: u16,
        description: String,
    },
    Abort,
}

#[derive(Debug)]
struct PendingData {
    message_type: MessageType,
    payload: Bytes,
    end_of_message: bool,
}

#[derive(Debug)]
struct Inbound {
    rx: mpsc::UnboundedReceiver<WireMessage>,
    pending: Option<PendingData>,
}

/// 回环对中的一端。
#[derive(Debug)]
pub struct MemoryWebSocket {
    state: Arc<Mutex<SocketState>>,
    outbound: mpsc::UnboundedSender<WireMessage>,
    inbound: AsyncMutex<Inbound>,
}

impl MemoryWebSocket {
    /// 创建一对已打开、互相连接的套接字。
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (Self::open(left_tx, left_rx), Self::open(right_tx, right_rx))
    }

    fn open(
        outbound: mpsc::UnboundedSender<WireMessage>,
        rx: mpsc::UnboundedReceiver<WireMessage>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SocketState::Open)),
            outbound,
            inbound: AsyncMutex::new(Inbound { rx, pending: None }),
        }
    }

    fn ensure_state(
        &self,
        op: SocketOperation,
        allowed: &[SocketState],
    ) -> Result<(), SocketError> {
        let state = *self.state.lock();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(SocketError::invalid_state(op, state))
        }
    }

    fn mark_aborted(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = SocketState::Aborted;
        }
    }

    fn on_close_received(&self) {
        let mut state = self.state.lock();
        *state = match *state {
            SocketState::Open => SocketState::CloseReceived,
            SocketState::CloseSent => SocketState::Closed,
            other => other,
        };
    }

    fn deliver(inbound: &mut Inbound, data: PendingData, buffer: &mut [u8]) -> RawReceiveResult {
        let PendingData {
            message_type,
            mut payload,
            end_of_message,
        } = data;
        let count = payload.len().min(buffer.len());
        buffer[..count].copy_from_slice(&payload[..count]);
        let rest = payload.split_off(count);
        if rest.is_empty() {
            RawReceiveResult::data(message_type, count, end_of_message)
        } else {
            inbound.pending = Some(PendingData {
                message_type,
                payload: rest,
                end_of_message,
            });
            RawReceiveResult::data(message_type, count, false)
        }
    }
}

#[async_trait]
impl RawWebSocket for MemoryWebSocket {
    async fn send(
        &self,
        buffer: &[u8],
        message_type: MessageType,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<(), SocketError> {
        if message_type == MessageType::Close {
            return Err(SocketError::new(
                CLOSE_VIA_SEND_CODE,
                SocketErrorKind::Other,
                "close frames must be sent through close_output",
            ));
        }
        if cancel.is_cancelled() {
            return Err(SocketError::cancelled(SocketOperation::Send));
        }
        self.ensure_state(
            SocketOperation::Send,
            &[SocketState::Open, SocketState::CloseReceived],
        )?;
        self.outbound
            .send(WireMessage::Data {
                message_type,
                payload: Bytes::copy_from_slice(buffer),
                end_of_message,
            })
            .map_err(|_| {
                self.mark_aborted();
                SocketError::connection_aborted(SocketOperation::Send)
            })
    }

    async fn receive(
        &self,
        buffer: &mut [u8],
        cancel: &Cancellation,
    ) -> Result<RawReceiveResult, SocketError> {
        let op = SocketOperation::Receive;
        self.ensure_state(op, &[SocketState::Open, SocketState::CloseSent])?;

        let mut inbound = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SocketError::cancelled(op)),
            guard = self.inbound.lock() => guard,
        };
        if let Some(pending) = inbound.pending.take() {
            return Ok(Self::deliver(&mut inbound, pending, buffer));
        }

        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SocketError::cancelled(op)),
            message = inbound.rx.recv() => message,
        };
        match message {
            Some(WireMessage::Data {
                message_type,
                payload,
                end_of_message,
            }) => {
                let data = PendingData {
                    message_type,
                    payload,
                    end_of_message,
                };
                Ok(Self::deliver(&mut inbound, data, buffer))
            }
            Some(WireMessage::Close {
                status,
                description,
            }) => {
                self.on_close_received();
                Ok(RawReceiveResult::close(Some(status), Some(description)))
            }
            Some(WireMessage::Abort) | None => {
                self.mark_aborted();
                Err(SocketError::connection_aborted(op))
            }
        }
    }

    async fn close_output(
        &self,
        status: u16,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<(), SocketError> {
        let op = SocketOperation::CloseOutput;
        if cancel.is_cancelled() {
            return Err(SocketError::cancelled(op));
        }
        {
            let mut state = self.state.lock();
            *state = match *state {
                SocketState::Open => SocketState::CloseSent,
                SocketState::CloseReceived => SocketState::Closed,
                other => return Err(SocketError::invalid_state(op, other)),
            };
        }
        self.outbound
            .send(WireMessage::Close {
                status,
                description: description.to_owned(),
            })
            .map_err(|_| {
                self.mark_aborted();
                SocketError::connection_aborted(op)
            })
    }

    fn abort(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = SocketState::Aborted;
        }
        let _ = self.outbound.send(WireMessage::Abort);
    }

    fn state(&self) -> SocketState {
        *self.state.lock()
    }
}
