//! 内存版集群队列（InMemoryQueue）
//!
//! 在单进程内模拟分布式队列，满足 `QueueClient` 协议：
//! - 每个队列名对应一个 FIFO，事件只会被一个消费者取走（恰好一次）；
//! - `dequeue` 在队列为空时挂起，可被安全取消，不会丢事件；
//! - `join`/`leave` 维护成员列表，并通过 `tokio::sync::broadcast` 推送成员变更。
//!
//! 典型用途：测试环境、示例与单进程部署。多个“节点”共享同一个克隆句柄即可。
//!
use super::{MembershipEvent, QueueClient, QueueName};
use crate::error::QueueError;
use crate::event::Event;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, broadcast};
use tokio_stream::wrappers::BroadcastStream;

#[derive(Default)]
struct QueueSlot {
    items: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
}

impl QueueSlot {
    fn items(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct Cluster {
    queues: Mutex<HashMap<QueueName, Arc<QueueSlot>>>,
    members: Mutex<Vec<String>>,
    membership_tx: broadcast::Sender<MembershipEvent>,
}

/// 内存队列句柄，克隆后共享同一份集群状态
#[derive(Clone)]
pub struct InMemoryQueue {
    cluster: Arc<Cluster>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_membership_capacity(64)
    }

    /// `capacity` 为成员变更广播的缓冲区容量
    pub fn with_membership_capacity(capacity: usize) -> Self {
        let (membership_tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            cluster: Arc::new(Cluster {
                queues: Mutex::new(HashMap::new()),
                members: Mutex::new(Vec::new()),
                membership_tx,
            }),
        }
    }

    fn slot(&self, queue: &QueueName) -> Arc<QueueSlot> {
        let mut queues = self
            .cluster
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        queues.entry(queue.clone()).or_default().clone()
    }

    fn existing_slot(&self, queue: &QueueName) -> Option<Arc<QueueSlot>> {
        self.cluster
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .cloned()
    }

    fn members_guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.cluster
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 当前待消费的事件数
    pub fn len(&self, queue: &QueueName) -> usize {
        self.existing_slot(queue)
            .map_or(0, |slot| slot.items().len())
    }

    pub fn is_empty(&self, queue: &QueueName) -> bool {
        self.len(queue) == 0
    }

    /// 永久关闭队列：挂起中与后续的 dequeue、enqueue 都会得到 `Fatal`
    pub fn close(&self, queue: &QueueName) {
        let slot = self.slot(queue);
        slot.closed.store(true, Ordering::Release);
        slot.notify.notify_waiters();
    }

    /// 节点加入集群；重复加入被忽略
    pub fn join(&self, node_id: impl Into<String>) {
        let node_id = node_id.into();
        {
            let mut members = self.members_guard();
            if members.contains(&node_id) {
                return;
            }
            members.push(node_id.clone());
        }
        // 无订阅者时 send 返回错误，视为非致命并忽略
        let _ = self
            .cluster
            .membership_tx
            .send(MembershipEvent::MemberJoined { node_id });
    }

    /// 节点离开集群；未知节点被忽略
    pub fn leave(&self, node_id: &str) {
        {
            let mut members = self.members_guard();
            let Some(pos) = members.iter().position(|m| m == node_id) else {
                return;
            };
            members.remove(pos);
        }
        let _ = self.cluster.membership_tx.send(MembershipEvent::MemberLeft {
            node_id: node_id.to_string(),
        });
    }

    pub fn members(&self) -> Vec<String> {
        self.members_guard().clone()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn enqueue(&self, queue: &QueueName, event: Event) -> Result<(), QueueError> {
        let slot = self.slot(queue);
        if slot.is_closed() {
            return Err(QueueError::fatal(format!("queue {queue} is closed")));
        }
        slot.items().push_back(event);
        slot.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, queue: &QueueName) -> Result<Event, QueueError> {
        let slot = self.slot(queue);

        loop {
            // 先注册等待再检查队列，避免检查与挂起之间的通知丢失
            let notified = slot.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if slot.is_closed() {
                return Err(QueueError::fatal(format!("queue {queue} is closed")));
            }
            if let Some(event) = slot.items().pop_front() {
                return Ok(event);
            }

            notified.await;
        }
    }

    async fn membership_events(&self) -> BoxStream<'static, MembershipEvent> {
        let rx = self.cluster.membership_tx.subscribe();
        // 落后丢弃的通知直接跳过
        let stream = BroadcastStream::new(rx).filter_map(|r| async move { r.ok() });
        Box::pin(stream)
    }
}
