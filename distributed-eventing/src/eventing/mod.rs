//! 事件子系统（eventing）
//!
//! 提供分布式事件总线的运行时：
//! - `HandlerRegistry`：去重、保序、写时复制的处理器集合；
//! - `Dispatcher`：将单个事件扇出给处理器，隔离处理器失败；
//! - `ConsumeLoop`：从共享队列持续出队、退避重试与协作式取消；
//! - `DistributedEventBus`：以 start/publish/shutdown 组合以上组件；
//! - `DomainEvents`：多条具名总线的统一发布入口。
//!
pub mod bus;
pub mod consume_loop;
pub mod dispatcher;
pub mod domain_events;
pub mod handler;
pub mod lifecycle;
pub mod registry;
pub mod reporter;

pub use bus::{BusConfig, DistributedEventBus, EventBus};
pub use consume_loop::{BusStats, RetryPolicy};
pub use dispatcher::{DispatchOutcome, Dispatcher, HandlerFailure};
pub use domain_events::DomainEvents;
pub use handler::{EventHandler, HandledEventType};
pub use lifecycle::LifecycleState;
pub use registry::{HandlerRegistry, HandlerSnapshot};
pub use reporter::{FailureReporter, LogReporter};
