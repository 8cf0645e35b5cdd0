//! 具名总线集合（DomainEvents）
//!
//! 应用可能同时持有多条总线（不同队列、不同集群），`DomainEvents` 将一次发布
//! 扇出到所有已注册的总线，并统一关闭。
//!
use super::bus::EventBus;
use crate::error::{BusError, BusResult};
use crate::event::Event;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

type NamedBus = (String, Arc<dyn EventBus>);

#[derive(Default)]
pub struct DomainEvents {
    buses: RwLock<Vec<NamedBus>>,
}

impl DomainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册总线；名称为空或重复时返回 `InvalidConfig`
    pub fn add_bus(&self, name: impl Into<String>, bus: Arc<dyn EventBus>) -> BusResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BusError::invalid_config("bus name must not be empty"));
        }

        let mut buses = self.buses.write().unwrap_or_else(PoisonError::into_inner);
        if buses.iter().any(|(n, _)| *n == name) {
            return Err(BusError::invalid_config(format!(
                "bus already registered: {name}"
            )));
        }
        buses.push((name, bus));
        Ok(())
    }

    pub fn remove_bus(&self, name: &str) -> Option<Arc<dyn EventBus>> {
        let mut buses = self.buses.write().unwrap_or_else(PoisonError::into_inner);
        let pos = buses.iter().position(|(n, _)| n == name)?;
        Some(buses.remove(pos).1)
    }

    pub fn bus_names(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|(n, _)| n).collect()
    }

    /// 向每条总线发布事件副本；全部尝试后返回遇到的第一个错误
    pub async fn publish(&self, event: Event) -> BusResult<()> {
        let mut first_err = None;

        for (name, bus) in self.snapshot() {
            if let Err(err) = bus.publish(event.clone()).await {
                warn!(bus = %name, event_id = event.event_id(), error = %err, "publish to bus failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn shutdown(&self) {
        for (_, bus) in self.snapshot() {
            bus.shutdown().await;
        }
    }

    fn snapshot(&self) -> Vec<NamedBus> {
        self.buses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct SpyBus {
        published: Mutex<Vec<String>>,
        fail: bool,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl EventBus for SpyBus {
        async fn publish(&self, event: Event) -> BusResult<()> {
            if self.fail {
                return Err(BusError::QueueUnavailable {
                    queue: "spy".into(),
                    reason: "down".into(),
                });
            }
            self.published
                .lock()
                .unwrap()
                .push(event.event_type().to_string());
            Ok(())
        }

        async fn shutdown(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_bus() {
        let events = DomainEvents::new();
        let a = Arc::new(SpyBus::default());
        let b = Arc::new(SpyBus::default());
        events.add_bus("a", a.clone()).unwrap();
        events.add_bus("b", b.clone()).unwrap();

        events
            .publish(Event::new("OrderCreated", serde_json::json!({"id": 42})))
            .await
            .unwrap();

        assert_eq!(*a.published.lock().unwrap(), vec!["OrderCreated"]);
        assert_eq!(*b.published.lock().unwrap(), vec!["OrderCreated"]);
    }

    #[tokio::test]
    async fn failing_bus_does_not_starve_the_rest() {
        let events = DomainEvents::new();
        let broken = Arc::new(SpyBus {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(SpyBus::default());
        events.add_bus("broken", broken).unwrap();
        events.add_bus("healthy", healthy.clone()).unwrap();

        let res = events
            .publish(Event::new("OrderCreated", serde_json::Value::Null))
            .await;

        assert!(matches!(res, Err(BusError::QueueUnavailable { .. })));
        assert_eq!(healthy.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registration_and_shutdown() {
        let events = DomainEvents::new();
        let a = Arc::new(SpyBus::default());
        events.add_bus("a", a.clone()).unwrap();

        assert!(events.add_bus("a", Arc::new(SpyBus::default())).is_err());
        assert!(events.add_bus("", Arc::new(SpyBus::default())).is_err());
        assert_eq!(events.bus_names(), vec!["a".to_string()]);

        events.shutdown().await;
        assert!(a.stopped.load(Ordering::SeqCst));

        assert!(events.remove_bus("a").is_some());
        assert!(events.remove_bus("a").is_none());
        assert!(events.bus_names().is_empty());
    }
}
