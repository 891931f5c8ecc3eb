use std::future::Future;

use crate::cancel::Cancellation;
use crate::error::{SocketError, SocketOperation};

/// 在保留取消语义的前提下执行一次原始套接字操作。
///
/// - 信号在调用前已触发：直接返回取消错误，不触碰套接字；
/// - 信号在等待期间触发：放弃底层 Future 并返回取消错误；
/// - 否则原样返回底层结果。
///
/// 取消分支使用 `biased` 优先，确保同时就绪时调用方看到的是取消而不是迟到的结果。
pub(crate) async fn run_cancellable<F, T>(
    cancel: &Cancellation,
    op: SocketOperation,
    future: F,
) -> Result<T, SocketError>
where
    F: Future<Output = Result<T, SocketError>>,
{
    if cancel.is_cancelled() {
        return Err(SocketError::cancelled(op));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SocketError::cancelled(op)),
        result = future => result,
    }
}
