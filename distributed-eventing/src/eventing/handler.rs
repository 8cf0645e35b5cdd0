//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类/全部事件的处理逻辑与元信息（名称、订阅类型）。
//! 处理器名称同时是订阅身份：名称相同的两个处理器视为同一订阅。
//!
use crate::event::Event;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

impl HandledEventType {
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::One(t) => t == event_type,
            Self::Many(ts) => ts.iter().any(|t| t == event_type),
        }
    }
}

/// 事件处理器。
///
/// 底层队列可能重复投递同一事件，实现需要保证幂等。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（订阅身份，亦用于失败上报与日志）
    ///
    /// 订阅按名称去重：名称相同的不同实例视为同一个订阅，只保留先注册的那个。
    fn handler_name(&self) -> &str;

    /// 返回该处理器支持的事件类型
    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    /// 处理事件
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handled_event_type_matching() {
        assert!(HandledEventType::All.matches("Anything"));
        assert!(HandledEventType::One("A".into()).matches("A"));
        assert!(!HandledEventType::One("A".into()).matches("B"));

        let many = HandledEventType::Many(vec!["A".into(), "B".into()]);
        assert!(many.matches("B"));
        assert!(!many.matches("C"));
    }
}
