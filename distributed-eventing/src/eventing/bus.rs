//! 分布式事件总线（DistributedEventBus）
//!
//! 以 `start`/`publish`/`shutdown` 三个操作组合处理器注册表、队列客户端、
//! 消费循环与分发器。装配通过 `DistributedEventBus::builder()` 一次性完成并校验，
//! 之后配置不可变，仅处理器集合可通过 `subscribe`/`unsubscribe` 调整。
//!
use super::consume_loop::{BusStats, ConsumeLoop, RetryPolicy, StatsCounters};
use super::dispatcher::Dispatcher;
use super::handler::EventHandler;
use super::lifecycle::{Lifecycle, LifecycleState};
use super::registry::{HandlerRegistry, HandlerSnapshot};
use super::reporter::{FailureReporter, LogReporter};
use crate::error::{BusError, BusResult};
use crate::event::Event;
use crate::queue::{DEFAULT_QUEUE_NAME, QueueClient, QueueName};
use async_trait::async_trait;
use bon::bon;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 事件总线：发布事件与优雅关闭
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Event) -> BusResult<()>;

    async fn publish_batch(&self, events: Vec<Event>) -> BusResult<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    async fn shutdown(&self);
}

/// 总线运行参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// 出队失败的退避策略
    pub retry: RetryPolicy,
    /// 单事件的处理并发（同一事件广播给多个 handler），1 为串行
    pub handler_concurrency: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            handler_concurrency: 1,
        }
    }
}

impl BusConfig {
    fn validate(&self) -> BusResult<()> {
        if self.handler_concurrency == 0 {
            return Err(BusError::invalid_config(
                "handler_concurrency must be at least 1",
            ));
        }
        if self.retry.initial_backoff.is_zero() {
            return Err(BusError::invalid_config(
                "retry.initial_backoff must be positive",
            ));
        }
        if self.retry.max_backoff < self.retry.initial_backoff {
            return Err(BusError::invalid_config(
                "retry.max_backoff must not be shorter than retry.initial_backoff",
            ));
        }
        if self.retry.multiplier == 0 {
            return Err(BusError::invalid_config(
                "retry.multiplier must be at least 1",
            ));
        }
        Ok(())
    }
}

pub struct DistributedEventBus {
    queue_name: QueueName,
    queue: Arc<dyn QueueClient>,
    registry: Arc<HandlerRegistry>,
    config: BusConfig,
    reporter: Arc<dyn FailureReporter>,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<StatsCounters>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

#[bon]
impl DistributedEventBus {
    /// 装配总线：校验队列名与运行参数，按 `subscribe` 规则对初始处理器去重
    #[builder]
    pub fn new(
        queue: Arc<dyn QueueClient>,
        #[builder(into, default = DEFAULT_QUEUE_NAME.to_string())] queue_name: String,
        #[builder(default)] handlers: Vec<Arc<dyn EventHandler>>,
        #[builder(default)] config: BusConfig,
        reporter: Option<Arc<dyn FailureReporter>>,
    ) -> BusResult<Self> {
        let queue_name = QueueName::new(queue_name)?;
        config.validate()?;

        Ok(Self {
            queue_name,
            queue,
            registry: Arc::new(HandlerRegistry::from_handlers(handlers)),
            config,
            reporter: reporter.unwrap_or_else(|| Arc::new(LogReporter)),
            lifecycle: Arc::new(Lifecycle::new()),
            stats: Arc::new(StatsCounters::default()),
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

impl DistributedEventBus {
    /// 追加处理器（幂等），运行中追加的处理器从下一个事件起生效
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> BusResult<&Self> {
        self.lifecycle.ensure_active("subscribe")?;
        self.registry.subscribe(handler);
        Ok(self)
    }

    pub fn unsubscribe(&self, handler_name: &str) -> BusResult<bool> {
        self.lifecycle.ensure_active("unsubscribe")?;
        Ok(self.registry.unsubscribe(handler_name))
    }

    /// 启动消费循环，必须在 tokio 运行时内调用
    pub fn start(&self) -> BusResult<()> {
        let runtime = Handle::try_current().map_err(|e| BusError::Runtime {
            reason: e.to_string(),
        })?;
        self.lifecycle.start()?;

        let consume = ConsumeLoop {
            queue_name: self.queue_name.clone(),
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            dispatcher: Dispatcher::new(
                self.queue_name.clone(),
                self.config.handler_concurrency,
                self.reporter.clone(),
            ),
            retry: self.config.retry,
            reporter: self.reporter.clone(),
            lifecycle: self.lifecycle.clone(),
            stats: self.stats.clone(),
        };

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(runtime.spawn(consume.supervise(self.token.clone())));
        tasks.push(runtime.spawn(Self::watch_membership(
            self.queue_name.clone(),
            self.queue.clone(),
            self.reporter.clone(),
            self.token.clone(),
        )));

        info!(queue = %self.queue_name, handlers = self.registry.len(), "event bus started");
        Ok(())
    }

    /// 投递到共享队列；Created 与 Running 状态均可发布，失败不重试
    pub async fn publish(&self, event: Event) -> BusResult<()> {
        self.lifecycle.ensure_active("publish")?;

        let event_id = event.event_id().to_string();
        self.queue
            .enqueue(&self.queue_name, event)
            .await
            .map_err(|e| BusError::QueueUnavailable {
                queue: self.queue_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(queue = %self.queue_name, event_id = %event_id, "event published");
        Ok(())
    }

    /// 按顺序发布，遇到第一个失败即返回
    pub async fn publish_batch(&self, events: Vec<Event>) -> BusResult<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// 请求协作式关闭并等待后台任务结束；正在执行的处理器不会被打断。幂等
    pub async fn shutdown(&self) {
        let previous = self.lifecycle.stop();
        self.token.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for t in tasks {
            let _ = t.await;
        }

        if previous != LifecycleState::Stopped {
            info!(queue = %self.queue_name, "event bus stopped");
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn handlers(&self) -> HandlerSnapshot {
        self.registry.snapshot()
    }

    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }

    async fn watch_membership(
        queue_name: QueueName,
        queue: Arc<dyn QueueClient>,
        reporter: Arc<dyn FailureReporter>,
        token: CancellationToken,
    ) {
        let mut events = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            events = queue.membership_events() => events,
        };

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                maybe_event = events.next() => match maybe_event {
                    Some(event) => reporter.membership_changed(&queue_name, &event),
                    None => break,
                },
            }
        }
    }
}

#[async_trait]
impl EventBus for DistributedEventBus {
    async fn publish(&self, event: Event) -> BusResult<()> {
        DistributedEventBus::publish(self, event).await
    }

    async fn publish_batch(&self, events: Vec<Event>) -> BusResult<()> {
        DistributedEventBus::publish_batch(self, events).await
    }

    async fn shutdown(&self) {
        DistributedEventBus::shutdown(self).await
    }
}

impl Drop for DistributedEventBus {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
