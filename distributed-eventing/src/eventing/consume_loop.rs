//! 消费循环（ConsumeLoop）
//!
//! 每个总线实例一个长驻任务：阻塞出队 → 取处理器快照 → 分发 → 继续。
//! - 可重试的出队失败按有界指数退避重试，不退出循环；
//! - 致命的出队失败会终止循环并将总线置为 Stopped；
//! - 关闭信号只打断出队等待与退避休眠，正在进行的分发总会执行完毕。
//!
use super::dispatcher::{Dispatcher, panic_message};
use super::lifecycle::Lifecycle;
use super::registry::HandlerRegistry;
use super::reporter::FailureReporter;
use crate::queue::{QueueClient, QueueName};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 出队失败的退避策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次重试前的等待
    pub initial_backoff: Duration,
    /// 退避上限
    pub max_backoff: Duration,
    /// 每次连续失败后的放大倍数
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次连续失败（从 1 开始）后的等待时长
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// 消费统计快照
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    pub events_dispatched: u64,
    pub handler_failures: u64,
    pub transient_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    events_dispatched: AtomicU64,
    handler_failures: AtomicU64,
    transient_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct ConsumeLoop {
    pub(crate) queue_name: QueueName,
    pub(crate) queue: Arc<dyn QueueClient>,
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) retry: RetryPolicy,
    pub(crate) reporter: Arc<dyn FailureReporter>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) stats: Arc<StatsCounters>,
}

impl ConsumeLoop {
    /// 运行消费循环；循环因 panic（例如上报器 panic）退出时同样将总线置为 Stopped
    pub(crate) async fn supervise(self, token: CancellationToken) {
        let queue_name = self.queue_name.clone();
        let lifecycle = self.lifecycle.clone();

        if let Err(panic) = AssertUnwindSafe(self.run(token.clone()))
            .catch_unwind()
            .await
        {
            error!(
                queue = %queue_name,
                reason = %panic_message(panic.as_ref()),
                "consume loop panicked"
            );
            token.cancel();
            lifecycle.stop();
        }
    }

    async fn run(self, token: CancellationToken) {
        info!(queue = %self.queue_name, "consume loop started");
        let mut attempt: u32 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = self.queue.dequeue(&self.queue_name) => next,
            };

            match next {
                Ok(event) => {
                    attempt = 0;
                    // 每个事件取一次快照，运行中新增的订阅从下一个事件起生效
                    let snapshot = self.registry.snapshot();
                    let outcome = self.dispatcher.dispatch(&event, &snapshot).await;

                    self.stats.events_dispatched.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .handler_failures
                        .fetch_add(outcome.failed() as u64, Ordering::Relaxed);
                    debug!(
                        queue = %self.queue_name,
                        event_id = event.event_id(),
                        event_type = event.event_type(),
                        invoked = outcome.invoked,
                        skipped = outcome.skipped,
                        failed = outcome.failed(),
                        "event dispatched"
                    );
                }
                Err(err) if err.is_fatal() => {
                    self.reporter.fatal_dequeue_failure(&self.queue_name, &err);
                    // 先取消令牌再置为 Stopped，观察到 Stopped 时其余后台任务已收到关闭信号
                    token.cancel();
                    self.lifecycle.stop();
                    break;
                }
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.retry.backoff_for(attempt);
                    self.stats.transient_failures.fetch_add(1, Ordering::Relaxed);
                    self.reporter
                        .transient_dequeue_failure(&self.queue_name, &err, attempt, delay);

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(queue = %self.queue_name, "consume loop stopped");
    }
}
