use anyhow::Result as AnyResult;
use async_trait::async_trait;
use distributed_eventing::{
    BusError, DistributedEventBus, Event, EventHandler, InMemoryQueue, LifecycleState, QueueName,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingHandler {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for CountingHandler {
    fn handler_name(&self) -> &str {
        self.name
    }
    async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn counting(name: &'static str, hits: &Arc<AtomicUsize>) -> Arc<dyn EventHandler> {
    Arc::new(CountingHandler {
        name,
        hits: hits.clone(),
    })
}

fn ping() -> Event {
    Event::new("Ping", serde_json::Value::Null)
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_is_monotonic() -> AnyResult<()> {
    let bus = DistributedEventBus::builder()
        .queue(Arc::new(InMemoryQueue::new()))
        .build()?;
    assert_eq!(bus.state(), LifecycleState::Created);

    bus.start()?;
    assert_eq!(bus.state(), LifecycleState::Running);

    let err = bus.start().unwrap_err();
    assert!(matches!(
        err,
        BusError::IllegalState {
            operation: "start",
            state: LifecycleState::Running
        }
    ));
    assert_eq!(bus.state(), LifecycleState::Running);

    bus.shutdown().await;
    assert_eq!(bus.state(), LifecycleState::Stopped);

    bus.shutdown().await;
    assert_eq!(bus.state(), LifecycleState::Stopped);

    assert!(bus.start().is_err());
    assert_eq!(bus.state(), LifecycleState::Stopped);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_before_start_is_consumed_after_start() -> AnyResult<()> {
    let queue = Arc::new(InMemoryQueue::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let producer = DistributedEventBus::builder().queue(queue.clone()).build()?;
    producer.publish(ping()).await?;
    producer.publish(ping()).await?;
    assert_eq!(queue.len(&QueueName::default()), 2);

    // 另一个尚未启动的同名总线实例随后启动，能消费到先前发布的事件
    let consumer = DistributedEventBus::builder()
        .queue(queue.clone())
        .handlers(vec![counting("counter", &hits)])
        .build()?;
    consumer.start()?;

    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while hits.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    consumer.shutdown().await;
    producer.shutdown().await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(queue.is_empty(&QueueName::default()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stopped_bus_rejects_publish_and_subscribe() -> AnyResult<()> {
    let hits = Arc::new(AtomicUsize::new(0));
    let bus = DistributedEventBus::builder()
        .queue(Arc::new(InMemoryQueue::new()))
        .build()?;
    bus.start()?;
    bus.shutdown().await;

    assert!(matches!(
        bus.publish(ping()).await,
        Err(BusError::IllegalState {
            operation: "publish",
            ..
        })
    ));
    assert!(matches!(
        bus.subscribe(counting("late", &hits)),
        Err(BusError::IllegalState {
            operation: "subscribe",
            ..
        })
    ));
    assert!(bus.handlers().is_empty());
    Ok(())
}

#[tokio::test]
async fn publish_surfaces_queue_unavailable() -> AnyResult<()> {
    let queue = Arc::new(InMemoryQueue::new());
    let bus = DistributedEventBus::builder()
        .queue(queue.clone())
        .queue_name("orders")
        .build()?;

    queue.close(&QueueName::new("orders")?);

    match bus.publish(ping()).await {
        Err(BusError::QueueUnavailable { queue, reason }) => {
            assert_eq!(queue, "orders");
            assert!(reason.contains("closed"));
        }
        other => panic!("expected QueueUnavailable, got {other:?}"),
    }
    // 发布失败不影响生命周期
    assert_eq!(bus.state(), LifecycleState::Created);
    Ok(())
}

#[tokio::test]
async fn initial_handlers_and_subscribe_share_dedup_rule() -> AnyResult<()> {
    let hits = Arc::new(AtomicUsize::new(0));
    let bus = DistributedEventBus::builder()
        .queue(Arc::new(InMemoryQueue::new()))
        .handlers(vec![
            counting("a", &hits),
            counting("b", &hits),
            counting("a", &hits),
        ])
        .build()?;

    bus.subscribe(counting("b", &hits))?
        .subscribe(counting("c", &hits))?;

    assert_eq!(bus.handlers().names(), vec!["a", "b", "c"]);
    assert!(bus.unsubscribe("b")?);
    assert!(!bus.unsubscribe("b")?);
    assert_eq!(bus.handlers().names(), vec!["a", "c"]);
    Ok(())
}
