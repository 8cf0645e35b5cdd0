//! 分布式事件总线（distributed-eventing）
//!
//! 应用代码将领域事件发布到一个集群共享的具名队列，集群内每个运行总线实例的节点
//! 都从该队列消费，并把事件分发给本地注册的处理器：
//! - 事件模型（`event`）：不可变的事件值与类型化负载转换
//! - 队列协议（`queue`）：`QueueClient` 抽象与内存版集群队列 `InMemoryQueue`
//! - 事件系统（`eventing`）：处理器注册表、分发器、消费循环与总线门面
//!
//! 本 crate 只依赖 `QueueClient` 协议，不绑定具体的分布式队列实现，
//! 可对接任意提供 enqueue/dequeue 与成员变更通知的消息系统。
//!
//! 典型用法：
//! 1. 实现 `EventHandler`，以 `handler_name` 作为订阅身份；
//! 2. 通过 `DistributedEventBus::builder()` 装配队列、队列名与初始处理器；
//! 3. 调用 `start()` 启动消费，`publish()` 发布事件，`shutdown()` 优雅关闭。
//!
pub mod error;
pub mod event;
pub mod eventing;
pub mod queue;

pub use error::{BusError, BusResult, QueueError};
pub use event::{DomainEvent, Event};
pub use eventing::{
    BusConfig, BusStats, DispatchOutcome, Dispatcher, DistributedEventBus, DomainEvents, EventBus,
    EventHandler, FailureReporter, HandledEventType, HandlerFailure, HandlerRegistry,
    HandlerSnapshot, LifecycleState, LogReporter, RetryPolicy,
};
pub use queue::{DEFAULT_QUEUE_NAME, InMemoryQueue, MembershipEvent, QueueClient, QueueName};
