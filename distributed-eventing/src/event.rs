//! 事件模型（Event）
//!
//! 事件是发布到总线的不可变事实：一个用于路由的事件类型，加上不透明的 JSON 负载。
//! 到达顺序由队列决定，不体现在事件本身。
//!
use crate::error::BusResult;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识符，未指定时生成 UUID v4
    #[builder(into, default = Uuid::new_v4().to_string())]
    event_id: String,
    /// 事件类型，处理器据此过滤
    #[builder(into)]
    event_type: String,
    /// 事件发生时间
    #[builder(default = Utc::now())]
    occurred_at: DateTime<Utc>,
    /// 事件负载
    #[builder(default)]
    payload: Value,
}

/// 可发布到总线的类型化领域事件
pub trait DomainEvent: Serialize {
    fn event_type(&self) -> &str;
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self::builder().event_type(event_type).payload(payload).build()
    }

    /// 将任意可序列化的负载包装为事件
    pub fn from_payload<T: Serialize + ?Sized>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> BusResult<Self> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    pub fn from_domain<E: DomainEvent>(event: &E) -> BusResult<Self> {
        Self::from_payload(event.event_type().to_string(), event)
    }

    /// 将负载反序列化为具体类型
    pub fn payload_as<T: DeserializeOwned>(&self) -> BusResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
