use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::cancel::Cancellation;
use crate::capability::{WebSocketCapability, WebSocketEnvironment};
use crate::config::AdapterConfig;
use crate::error::{Result, SocketError, SocketOperation};
use crate::frame::{CloseFrame, NORMAL_CLOSURE, ReceiveResult};
use crate::observability::next_connection_id;
use crate::opcode;
use crate::raw::{MessageType, RawReceiveResult, RawSocketContext, RawWebSocket};
use crate::teardown::TeardownAction;
use crate::util::run_cancellable;

/// 协议适配器：包装一个原始套接字，对外发布三个能力与元数据，并负责连接清理。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 原始套接字的通用发送路径不允许发送关闭帧，而通用调用约定把关闭帧当作普通数据帧传递；
///   适配器把这类调用改写为控制层面的半关闭；
/// - 连接结束时根据套接字状态选择“什么都不做 / 完成握手 / 中止”，既不违反协议，也不会因为
///   等待对端而挂起。
///
/// ## 逻辑 (How)
/// - 内部以 `Arc<AdapterInner>` 共享套接字上下文，能力环境持有同一个 `Arc` 的 trait 对象；
/// - 每个能力调用都是一次纯转换加一次原始套接字操作，通过 `run_cancellable` 注入取消语义；
/// - `cleanup` 用原子标志保证只执行一次，读取状态一次后执行对应动作，最后触发连接级取消信号。
///
/// ## 契约 (What)
/// - `environment`：构造时生成的能力环境，只读；
/// - `cleanup`：返回实际采取的 [`TeardownAction`]；重复调用返回 `TeardownAction::None`；
/// - 适配器本身也实现 [`WebSocketCapability`]，可直接调用。
///
/// ## 注意事项 (Trade-offs)
/// - 适配器不串行化并发调用；两个并发 `send` 的行为由原始套接字决定；
/// - `CloseReceived` 状态下的关闭受 `cleanup_close_timeout` 约束，超时或失败时改为中止并返回错误。
pub struct WebSocketAdapter<C: RawSocketContext> {
    inner: Arc<AdapterInner<C>>,
    environment: WebSocketEnvironment,
}

struct AdapterInner<C: RawSocketContext> {
    context: Arc<C>,
    connection_id: String,
    cleanup_close_timeout: Duration,
    call_cancelled: Cancellation,
    cleaned_up: AtomicBool,
}

/// [`WebSocketAdapter`] 的构建器。
pub struct WebSocketAdapterBuilder<C: RawSocketContext> {
    context: Arc<C>,
    config: AdapterConfig,
    call_cancelled: Option<Cancellation>,
}

impl<C: RawSocketContext> WebSocketAdapterBuilder<C> {
    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用调用方提供的连接级取消信号，而不是适配器自建的信号。
    pub fn call_cancellation(mut self, cancel: Cancellation) -> Self {
        self.call_cancelled = Some(cancel);
        self
    }

    pub fn build(self) -> WebSocketAdapter<C> {
        let AdapterConfig {
            version,
            cleanup_close_timeout,
            connection_id,
        } = self.config;
        let inner = Arc::new(AdapterInner {
            context: self.context,
            connection_id: connection_id.unwrap_or_else(next_connection_id),
            cleanup_close_timeout,
            call_cancelled: self.call_cancelled.unwrap_or_default(),
            cleaned_up: AtomicBool::new(false),
        });

        let capability: Arc<dyn WebSocketCapability> = inner.clone();
        let context: Arc<dyn Any + Send + Sync> = inner.context.clone();
        let environment = WebSocketEnvironment::new(
            capability,
            inner.call_cancelled.child(),
            &version,
            context,
        );
        debug!(
            websocket.connection_id = %inner.connection_id,
            version = %version,
            "websocket adapter created"
        );

        WebSocketAdapter { inner, environment }
    }
}

impl<C: RawSocketContext> WebSocketAdapter<C> {
    /// 以默认配置包装套接字上下文。
    pub fn new(context: Arc<C>) -> Self {
        Self::builder(context).build()
    }

    pub fn builder(context: Arc<C>) -> WebSocketAdapterBuilder<C> {
        WebSocketAdapterBuilder {
            context,
            config: AdapterConfig::default(),
            call_cancelled: None,
        }
    }

    /// 发布给调用方的能力环境。
    pub fn environment(&self) -> &WebSocketEnvironment {
        &self.environment
    }

    pub fn context(&self) -> &Arc<C> {
        &self.inner.context
    }

    pub fn connection_id(&self) -> &str {
        &self.inner.connection_id
    }

    /// 将连接带到终态。
    ///
    /// # 教案式注释
    ///
    /// ## 逻辑 (How)
    /// 1. 原子标志保证只执行一次；后续调用直接返回 `TeardownAction::None`；
    /// 2. 读取一次套接字状态，按 [`TeardownAction::for_state`] 选择动作；
    ///    表外状态返回错误并复位标志，此时没有任何套接字调用发生；
    /// 3. `CompleteClose` 在时限内发送正常关闭，失败或超时则中止；
    /// 4. 触发连接级取消信号，通知仍持有能力环境的调用方。
    ///
    /// ## 契约 (What)
    /// - 返回实际采取的动作；关闭失败时返回该传输错误（连接已被中止）。
    pub async fn cleanup(&self) -> Result<TeardownAction> {
        let inner = &self.inner;
        if inner.cleaned_up.swap(true, Ordering::AcqRel) {
            trace!(
                websocket.connection_id = %inner.connection_id,
                "cleanup already performed"
            );
            return Ok(TeardownAction::None);
        }

        let socket = inner.socket();
        let state = socket.state();
        let action = match TeardownAction::for_state(state) {
            Ok(action) => action,
            Err(err) => {
                inner.cleaned_up.store(false, Ordering::Release);
                warn!(
                    websocket.connection_id = %inner.connection_id,
                    websocket.state = ?state,
                    "cleanup observed an unexpected socket state"
                );
                return Err(err);
            }
        };
        debug!(
            websocket.connection_id = %inner.connection_id,
            websocket.state = ?state,
            websocket.action = action.label(),
            "tearing down websocket"
        );

        let outcome = match action {
            TeardownAction::None => Ok(()),
            TeardownAction::Abort => {
                socket.abort();
                Ok(())
            }
            TeardownAction::CompleteClose => inner.complete_close().await,
        };
        inner.call_cancelled.cancel();
        outcome.map(|()| action)
    }
}

impl<C: RawSocketContext> AdapterInner<C> {
    fn socket(&self) -> &C::Socket {
        self.context.socket()
    }

    async fn close_output(&self, status: u16, description: &str, cancel: &Cancellation) -> Result<()> {
        trace!(
            websocket.connection_id = %self.connection_id,
            websocket.close_status = status,
            "closing websocket output"
        );
        run_cancellable(
            cancel,
            SocketOperation::CloseOutput,
            self.socket().close_output(status, description, cancel),
        )
        .await?;
        Ok(())
    }

    /// 原始套接字的通用发送路径不接受关闭帧，因此把关闭帧载荷解包后改走半关闭。
    async fn redirect_send_to_close(&self, buffer: &[u8], cancel: &Cancellation) -> Result<()> {
        let close = CloseFrame::parse(buffer)?;
        debug!(
            websocket.connection_id = %self.connection_id,
            websocket.close_status = close.status,
            "redirecting close frame to close_output"
        );
        self.close_output(close.status, &close.description, cancel)
            .await
    }

    /// 超时后底层关闭 Future 随 `timeout` 一并被丢弃，不会继续占用连接。
    async fn complete_close(&self) -> Result<()> {
        let socket = self.socket();
        let cancel = Cancellation::new();
        let close = socket.close_output(NORMAL_CLOSURE, "", &cancel);
        let failure = match tokio::time::timeout(self.cleanup_close_timeout, close).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_) => SocketError::timeout(SocketOperation::CloseOutput),
        };
        warn!(
            websocket.connection_id = %self.connection_id,
            error = %failure,
            "closing handshake failed during cleanup, aborting"
        );
        socket.abort();
        Err(failure.into())
    }
}

fn translate(raw: RawReceiveResult) -> ReceiveResult {
    let RawReceiveResult {
        message_type,
        end_of_message,
        count,
        close_status,
        close_description,
    } = raw;
    match message_type {
        MessageType::Text => ReceiveResult::Text {
            end_of_message,
            count,
        },
        MessageType::Binary => ReceiveResult::Binary {
            end_of_message,
            count,
        },
        MessageType::Close => ReceiveResult::Close {
            end_of_message,
            status: close_status,
            description: close_description,
        },
    }
}

#[async_trait]
impl<C: RawSocketContext> WebSocketCapability for AdapterInner<C> {
    async fn send(
        &self,
        buffer: &[u8],
        opcode: u8,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<()> {
        let message_type = opcode::to_native(opcode)?;
        if message_type == MessageType::Close {
            return self.redirect_send_to_close(buffer, cancel).await;
        }

        trace!(
            websocket.connection_id = %self.connection_id,
            websocket.opcode = opcode,
            len = buffer.len(),
            end_of_message,
            "sending websocket frame"
        );
        run_cancellable(
            cancel,
            SocketOperation::Send,
            self.socket()
                .send(buffer, message_type, end_of_message, cancel),
        )
        .await?;
        Ok(())
    }

    async fn receive(&self, buffer: &mut [u8], cancel: &Cancellation) -> Result<ReceiveResult> {
        let raw = run_cancellable(
            cancel,
            SocketOperation::Receive,
            self.socket().receive(buffer, cancel),
        )
        .await?;
        trace!(
            websocket.connection_id = %self.connection_id,
            websocket.opcode = opcode::to_generic(raw.message_type),
            count = raw.count,
            end_of_message = raw.end_of_message,
            "received websocket frame"
        );
        Ok(translate(raw))
    }

    async fn close(&self, status: u16, description: &str, cancel: &Cancellation) -> Result<()> {
        self.close_output(status, description, cancel).await
    }
}

#[async_trait]
impl<C: RawSocketContext> WebSocketCapability for WebSocketAdapter<C> {
    async fn send(
        &self,
        buffer: &[u8],
        opcode: u8,
        end_of_message: bool,
        cancel: &Cancellation,
    ) -> Result<()> {
        self.inner
            .send(buffer, opcode, end_of_message, cancel)
            .await
    }

    async fn receive(&self, buffer: &mut [u8], cancel: &Cancellation) -> Result<ReceiveResult> {
        self.inner.receive(buffer, cancel).await
    }

    async fn close(&self, status: u16, description: &str, cancel: &Cancellation) -> Result<()> {
        self.inner.close(status, description, cancel).await
    }
}
