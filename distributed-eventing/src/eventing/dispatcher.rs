//! 事件分发器（Dispatcher）
//!
//! 将单个事件按注册顺序交给快照中匹配的处理器。处理器之间相互隔离：
//! 任一处理器返回错误或 panic 只会被记录并上报，不影响其余处理器，也不会中断消费循环。
//!
use super::registry::HandlerSnapshot;
use super::reporter::FailureReporter;
use crate::event::Event;
use crate::queue::QueueName;
use super::handler::EventHandler;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, stream};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

type PanicPayload = Box<dyn Any + Send>;
type HandlerCall = (
    Arc<dyn EventHandler>,
    Result<anyhow::Result<()>, PanicPayload>,
);

/// 单个处理器的失败记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: String,
    pub reason: String,
    pub panicked: bool,
}

/// 一次分发的汇总结果，仅用于观测，不会据此回滚消费
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// 实际调用的处理器数（含失败）
    pub invoked: usize,
    /// 因事件类型不匹配而跳过的处理器数
    pub skipped: usize,
    /// 按注册顺序排列的失败
    pub failures: Vec<HandlerFailure>,
}

impl DispatchOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    queue_name: QueueName,
    concurrency: usize,
    reporter: Arc<dyn FailureReporter>,
}

impl Dispatcher {
    /// `concurrency` 为同一事件同时运行的处理器上限，1 表示严格串行
    pub fn new(
        queue_name: QueueName,
        concurrency: usize,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            queue_name,
            concurrency: concurrency.max(1),
            reporter,
        }
    }

    pub async fn dispatch(&self, event: &Event, handlers: &HandlerSnapshot) -> DispatchOutcome {
        let matching: Vec<_> = handlers
            .iter()
            .filter(|h| h.handled_event_type().matches(event.event_type()))
            .cloned()
            .collect();
        let skipped = handlers.len() - matching.len();

        let calls: Vec<BoxFuture<'_, HandlerCall>> = matching
            .into_iter()
            .map(|handler| -> BoxFuture<'_, HandlerCall> {
                Box::pin(async move {
                    let result = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
                    (handler, result)
                })
            })
            .collect();

        // buffered 保证结果顺序与注册顺序一致
        let results: Vec<HandlerCall> = stream::iter(calls)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = DispatchOutcome {
            invoked: results.len(),
            skipped,
            failures: Vec::new(),
        };

        for (handler, result) in results {
            let failure = match result {
                Ok(Ok(())) => {
                    debug!(
                        queue = %self.queue_name,
                        event_id = event.event_id(),
                        handler = handler.handler_name(),
                        "event handled"
                    );
                    continue;
                }
                Ok(Err(err)) => HandlerFailure {
                    handler: handler.handler_name().to_string(),
                    reason: format!("{err:#}"),
                    panicked: false,
                },
                Err(panic) => HandlerFailure {
                    handler: handler.handler_name().to_string(),
                    reason: panic_message(panic.as_ref()),
                    panicked: true,
                },
            };
            self.reporter
                .handler_failure(&self.queue_name, event, &failure);
            outcome.failures.push(failure);
        }

        outcome
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
