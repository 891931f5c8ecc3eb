//! 集成测试共享的录制型套接字桩。
//!
//! `RecordingSocket` 记录每一次原始调用，接收结果按脚本依次返回，关闭行为可配置为成功、
//! 失败或挂起，用于精确断言适配层“调用了什么、没调用什么”。

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spark_websocket::{
    Cancellation, MessageType, RawReceiveResult, RawWebSocket, SocketContext, SocketError,
    SocketErrorKind, SocketOperation, SocketState, WebSocketAdapter,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Send {
        payload: Vec<u8>,
        message_type: MessageType,
        end_of_message: bool,
    },
    Receive,
    CloseOutput {
        status: u16,
        description: String,
    },
    Abort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseBehavior {
    Succeed,
    Fail,
    /// 一直挂起直到取消信号触发。
    Hang,
}

pub const INJECTED_FAILURE: &str = "test.injected_failure";

pub struct RecordingSocket {
    calls: Mutex<Vec<Call>>,
    state: Mutex<SocketState>,
    receive_script: Mutex<VecDeque<Result<RawReceiveResult, SocketError>>>,
    close_behavior: Mutex<CloseBehavior>,
    send_fails: Mutex<bool>,
    abort_updates_state: bool,
    hung_closes: Arc<AtomicUsize>,
}

/// 挂起中的关闭调用计数；Future 被丢弃时自动减一。
struct HungClose(Arc<AtomicUsize>);

impl HungClose {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for HungClose {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingSocket {
    pub fn new(state: SocketState) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(state),
            receive_script: Mutex::new(VecDeque::new()),
            close_behavior: Mutex::new(CloseBehavior::Succeed),
            send_fails: Mutex::new(false),
            abort_updates_state: true,
            hung_closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 状态永不改变的套接字，用于验证适配层自身的幂等保护。
    pub fn frozen(state: SocketState) -> Self {
        Self {
            abort_updates_state: false,
            ..Self::new(state)
        }
    }

    pub fn script_receive(&self, result: Result<RawReceiveResult, SocketError>) {
        self.receive_script.lock().unwrap().push_back(result);
    }

    pub fn set_close_behavior(&self, behavior: CloseBehavior) {
        *self.close_behavior.lock().unwrap() = behavior;
    }

    pub fn fail_sends(&self) {
        *self.send_fails.lock().unwrap() = true;
    }

    pub fn set_state(&self, state: SocketState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn abort_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Abort))
            .count()
    }

    /// 仍在等待的挂起关闭调用数。
    pub fn hung_closes_in_flight(&self) -> usize {
        self.hung_closes.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn injected_failure(op: SocketOperation) -> SocketError {
    SocketError::new(
        INJECTED_FAILURE,
        SocketErrorKind::Io,
        format!("{} failed by test", op.label()),
    )
}

#[async_trait]
impl RawWebSocket for RecordingSocket {
    async fn send(
        &self,
        buffer: &[u8],
        message_type: MessageType,
        end_of_message: bool,
        _cancel: &Cancellation,
    ) -> Result<(), SocketError> {
        self.record(Call::Send {
            payload: buffer.to_vec(),
            message_type,
            end_of_message,
        });
        if *self.send_fails.lock().unwrap() {
            return Err(injected_failure(SocketOperation::Send));
        }
        Ok(())
    }

    async fn receive(
        &self,
        _buffer: &mut [u8],
        cancel: &Cancellation,
    ) -> Result<RawReceiveResult, SocketError> {
        self.record(Call::Receive);
        let next = self.receive_script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                cancel.cancelled().await;
                Err(SocketError::cancelled(SocketOperation::Receive))
            }
        }
    }

    async fn close_output(
        &self,
        status: u16,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<(), SocketError> {
        self.record(Call::CloseOutput {
            status,
            description: description.to_owned(),
        });
        let behavior = *self.close_behavior.lock().unwrap();
        match behavior {
            CloseBehavior::Succeed => {
                let mut state = self.state.lock().unwrap();
                *state = match *state {
                    SocketState::CloseReceived => SocketState::Closed,
                    SocketState::Open => SocketState::CloseSent,
                    other => other,
                };
                Ok(())
            }
            CloseBehavior::Fail => Err(injected_failure(SocketOperation::CloseOutput)),
            CloseBehavior::Hang => {
                let _hung = HungClose::enter(&self.hung_closes);
                cancel.cancelled().await;
                Err(SocketError::cancelled(SocketOperation::CloseOutput))
            }
        }
    }

    fn abort(&self) {
        self.record(Call::Abort);
        if self.abort_updates_state {
            let mut state = self.state.lock().unwrap();
            if !state.is_terminal() {
                *state = SocketState::Aborted;
            }
        }
    }

    fn state(&self) -> SocketState {
        *self.state.lock().unwrap()
    }
}

pub type RecordingAdapter = WebSocketAdapter<SocketContext<RecordingSocket>>;

pub fn adapter_for(socket: RecordingSocket) -> RecordingAdapter {
    WebSocketAdapter::new(Arc::new(SocketContext::new(socket)))
}

pub fn socket_of(adapter: &RecordingAdapter) -> &RecordingSocket {
    use spark_websocket::RawSocketContext;
    adapter.context().socket()
}
