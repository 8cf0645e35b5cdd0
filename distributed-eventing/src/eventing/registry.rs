//! 处理器注册表（HandlerRegistry）
//!
//! 写少读多：`subscribe`/`unsubscribe` 构造新的不可变列表并原子替换，
//! 分发时通过 `snapshot` 读取一致视图，不会看到半更新的列表，也不持有锁。
//!
use super::handler::EventHandler;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// 注册表某一时刻的只读有序视图
#[derive(Clone)]
pub struct HandlerSnapshot {
    handlers: Arc<HandlerList>,
}

impl HandlerSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EventHandler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.handler_name()).collect()
    }
}

impl fmt::Debug for HandlerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// 去重、保序的处理器集合，由总线独占
pub struct HandlerRegistry {
    handlers: ArcSwap<HandlerList>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 `subscribe` 相同的规则去重构造
    pub fn from_handlers(handlers: impl IntoIterator<Item = Arc<dyn EventHandler>>) -> Self {
        let mut list: HandlerList = Vec::new();
        for h in handlers {
            if !contains_name(&list, h.handler_name()) {
                list.push(h);
            }
        }
        Self {
            handlers: ArcSwap::from_pointee(list),
        }
    }

    /// 追加处理器；同名处理器已存在时为空操作
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> &Self {
        self.handlers.rcu(|current| {
            if contains_name(current, handler.handler_name()) {
                return Arc::clone(current);
            }
            let mut next = HandlerList::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(handler.clone());
            Arc::new(next)
        });
        self
    }

    /// 移除指定名称的处理器，返回是否确有移除；已取出的快照不受影响
    pub fn unsubscribe(&self, handler_name: &str) -> bool {
        let previous = self.handlers.rcu(|current| {
            if !contains_name(current, handler_name) {
                return Arc::clone(current);
            }
            let next: HandlerList = current
                .iter()
                .filter(|h| h.handler_name() != handler_name)
                .cloned()
                .collect();
            Arc::new(next)
        });
        contains_name(&previous, handler_name)
    }

    pub fn snapshot(&self) -> HandlerSnapshot {
        HandlerSnapshot {
            handlers: self.handlers.load_full(),
        }
    }

    pub fn contains(&self, handler_name: &str) -> bool {
        contains_name(&self.handlers.load(), handler_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.load().is_empty()
    }
}

fn contains_name(list: &HandlerList, handler_name: &str) -> bool {
    list.iter().any(|h| h.handler_name() == handler_name)
}
