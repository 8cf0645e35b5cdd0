//! 分布式队列协议（QueueClient）
//!
//! 总线对底层分布式队列只有三点要求：向具名队列投递、从具名队列阻塞取出、
//! 以及节点加入/离开的通知。投递语义（至多一次/至少一次/恰好一次）由具体实现决定，
//! 总线按“至少一次”设计，处理器需要保证幂等。
//!
pub mod inmemory;

pub use inmemory::InMemoryQueue;

use crate::error::{BusError, BusResult, QueueError};
use crate::event::Event;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::fmt;

pub const DEFAULT_QUEUE_NAME: &str = "domain-events";

/// 共享队列名，总线实例生命周期内固定且非空
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> BusResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BusError::invalid_config("queue name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueName {
    fn default() -> Self {
        Self(DEFAULT_QUEUE_NAME.to_string())
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 集群成员变更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    MemberJoined { node_id: String },
    MemberLeft { node_id: String },
}

impl MembershipEvent {
    pub fn node_id(&self) -> &str {
        match self {
            Self::MemberJoined { node_id } | Self::MemberLeft { node_id } => node_id,
        }
    }
}

/// 分布式队列客户端：由外部拥有，可被多个总线实例共享
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn enqueue(&self, queue: &QueueName, event: Event) -> Result<(), QueueError>;

    /// 阻塞直到取得一条事件。
    ///
    /// 返回的 future 必须可以安全丢弃：总线关闭时会在等待中途取消它，
    /// 被取消的调用不得吞掉事件。
    async fn dequeue(&self, queue: &QueueName) -> Result<Event, QueueError>;

    /// 返回一个 'static 生命周期的成员变更流；不支持成员通知的实现返回空流
    async fn membership_events(&self) -> BoxStream<'static, MembershipEvent> {
        Box::pin(futures_util::stream::empty())
    }
}
