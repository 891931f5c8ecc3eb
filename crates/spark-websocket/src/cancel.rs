use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// 取消原语，表达单次调用或整条连接的可中断性。
///
/// # 设计背景（Why）
/// - 每个能力调用（send/receive/close）都接受一个取消信号；信号触发后调用必须尽快失败，
///   但取消本身不会关闭或中止连接，这仍是调用方或清理例程的职责。
/// - 与 `spark-core` 的同名原语一致，以原子位表达状态；额外挂一个 [`Notify`]，
///   使等待方可以直接 `await` 而不必轮询。
///
/// # 逻辑解析（How）
/// - `cancel` 在首次成功设置取消位时返回 `true` 并唤醒全部等待者，重复调用返回 `false`；
/// - `child` 共享同一状态，便于在子任务中传播；
/// - [`cancelled`](Self::cancelled) 先登记唤醒再检查标志位，避免“检查后、登记前”被取消而漏掉唤醒。
///
/// # 契约说明（What）
/// - **前置条件**：无；默认处于未取消状态。
/// - **后置条件**：`cancel` 成功后 `is_cancelled` 对所有克隆立即可见。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    flag: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// 创建处于“未取消”状态的取消令牌。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// 将令牌标记为取消。
    ///
    /// 返回 `true` 表示本次调用首次触发取消；返回 `false` 表示之前已被取消。
    pub fn cancel(&self) -> bool {
        let first = self
            .inner
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// 派生共享同一状态的子令牌。
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// 等待令牌被取消；若已取消则立即返回。
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
