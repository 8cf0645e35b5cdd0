use anyhow::Result as AnyResult;
use async_trait::async_trait;
use distributed_eventing::{
    DistributedEventBus, DomainEvent, Event, EventHandler, HandledEventType, InMemoryQueue,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct OrderCreated {
    id: u64,
}

impl DomainEvent for OrderCreated {
    fn event_type(&self) -> &str {
        "OrderCreated"
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderCancelled {
    id: u64,
    reason: String,
}

impl DomainEvent for OrderCancelled {
    fn event_type(&self) -> &str {
        "OrderCancelled"
    }
}

// ============================================================================
// 处理器
// ============================================================================

/// 记录所有事件
struct Logger {
    node: &'static str,
}

#[async_trait]
impl EventHandler for Logger {
    fn handler_name(&self) -> &str {
        "Logger"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        info!(
            node = self.node,
            event_id = event.event_id(),
            event_type = event.event_type(),
            payload = %event.payload(),
            "logged"
        );
        Ok(())
    }
}

/// 只关心下单事件；每第三单模拟一次通知失败
struct Notifier {
    node: &'static str,
    sent: AtomicUsize,
}

#[async_trait]
impl EventHandler for Notifier {
    fn handler_name(&self) -> &str {
        "Notifier"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One("OrderCreated".to_string())
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let order: OrderCreated = event.payload_as()?;
        if order.id % 3 == 0 {
            anyhow::bail!("mail server rejected notification for order {}", order.id);
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(node = self.node, order_id = order.id, "customer notified");
        Ok(())
    }
}

fn node(queue: &Arc<InMemoryQueue>, name: &'static str) -> AnyResult<DistributedEventBus> {
    let bus = DistributedEventBus::builder()
        .queue(queue.clone())
        .queue_name("domain-events")
        .build()?;
    bus.subscribe(Arc::new(Logger { node: name }))?
        .subscribe(Arc::new(Notifier {
            node: name,
            sent: AtomicUsize::new(0),
        }))?;
    queue.join(name);
    Ok(bus)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 两个节点共享同一个集群队列
    let queue = Arc::new(InMemoryQueue::new());
    let node_a = node(&queue, "node-a")?;
    node_a.start()?;
    let node_b = node(&queue, "node-b")?;
    node_b.start()?;

    node_a.publish(Event::from_domain(&OrderCreated { id: 42 })?).await?;
    for id in 1..=5 {
        node_b.publish(Event::from_domain(&OrderCreated { id })?).await?;
    }
    node_a
        .publish(Event::from_domain(&OrderCancelled {
            id: 2,
            reason: "customer request".to_string(),
        })?)
        .await?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    queue.leave("node-b");

    node_a.shutdown().await;
    node_b.shutdown().await;

    let (a, b) = (node_a.stats(), node_b.stats());
    info!(
        node_a_events = a.events_dispatched,
        node_b_events = b.events_dispatched,
        handler_failures = a.handler_failures + b.handler_failures,
        "demo finished"
    );
    Ok(())
}
