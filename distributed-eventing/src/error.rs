//! 事件总线统一错误定义
//!
//! `BusError` 面向调用方（装配、生命周期、发布）；`QueueError` 是队列协议返回的
//! 错误，由消费循环区分为可重试与致命两类。
//!
use crate::eventing::LifecycleState;
use thiserror::Error;

/// 总线错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    // --- 装配 ---
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    // --- 生命周期 ---
    #[error("illegal state: operation={operation}, state={state}")]
    IllegalState {
        operation: &'static str,
        state: LifecycleState,
    },
    #[error("runtime error: {reason}")]
    Runtime { reason: String },

    // --- 发布 ---
    #[error("queue unavailable: queue={queue}, reason={reason}")]
    QueueUnavailable { queue: String, reason: String },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl BusError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn illegal_state(operation: &'static str, state: LifecycleState) -> Self {
        Self::IllegalState { operation, state }
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;

/// 队列协议错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// 暂时不可用（网络抖动、节点切换等），消费循环会退避重试
    #[error("queue temporarily unavailable: {reason}")]
    Transient { reason: String },
    /// 永久不可用（队列被销毁、集群关闭等），消费循环将退出
    #[error("queue permanently unavailable: {reason}")]
    Fatal { reason: String },
}

impl QueueError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason } | Self::Fatal { reason } => reason,
        }
    }
}
