/// 队列故障恢复示例
/// 展示出队短暂失败时的退避重试、处理器失败隔离，以及队列被销毁后总线自动停止
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use distributed_eventing::{
    BusConfig, DistributedEventBus, Event, EventHandler, InMemoryQueue, QueueClient, QueueError,
    QueueName, RetryPolicy,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ============================================================================
// 时好时坏的队列：每隔几次出队返回一次可重试错误
// ============================================================================

struct FlakyQueue {
    inner: InMemoryQueue,
    calls: AtomicUsize,
}

#[async_trait]
impl QueueClient for FlakyQueue {
    async fn enqueue(&self, queue: &QueueName, event: Event) -> Result<(), QueueError> {
        self.inner.enqueue(queue, event).await
    }

    async fn dequeue(&self, queue: &QueueName) -> Result<Event, QueueError> {
        if self.calls.fetch_add(1, Ordering::Relaxed) % 3 == 0 {
            return Err(QueueError::transient("partition leader moved"));
        }
        self.inner.dequeue(queue).await
    }
}

// ============================================================================
// 处理器
// ============================================================================

struct Printer;

#[async_trait]
impl EventHandler for Printer {
    fn handler_name(&self) -> &str {
        "printer"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        println!("printer: type={} payload={}", event.event_type(), event.payload());
        Ok(())
    }
}

struct Picky;

#[async_trait]
impl EventHandler for Picky {
    fn handler_name(&self) -> &str {
        "picky"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        if event.event_type() == "UserDeleted" {
            anyhow::bail!("picky refuses {}", event.event_type());
        }
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== 队列故障恢复示例 ===\n");
    let inner = InMemoryQueue::new();
    let queue = Arc::new(FlakyQueue {
        inner: inner.clone(),
        calls: AtomicUsize::new(0),
    });
    let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(Printer), Arc::new(Picky)];

    let bus = DistributedEventBus::builder()
        .queue(queue)
        .queue_name("users")
        .handlers(handlers)
        .config(BusConfig {
            retry: RetryPolicy {
                initial_backoff: Duration::from_millis(50),
                max_backoff: Duration::from_millis(400),
                multiplier: 2,
            },
            ..Default::default()
        })
        .build()?;

    bus.start()?;
    println!("✅ 总线已启动");

    for (i, ty) in ["UserCreated", "UserDeleted", "UserCreated"].iter().enumerate() {
        bus.publish(Event::new(*ty, serde_json::json!({ "seq": i })))
            .await?;
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("stats: {:?}", bus.stats());

    // 队列被销毁：消费循环退出，总线进入 Stopped
    inner.close(bus.queue_name());
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("state after close: {}", bus.state());

    bus.shutdown().await;
    println!("\n✅ 优雅关闭完成");
    Ok(())
}
