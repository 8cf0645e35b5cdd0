//! 失败上报通道（FailureReporter）
//!
//! 消费循环中发生的失败没有同步调用方可以返回，统一经由该通道上报。
//! 默认实现 `LogReporter` 输出结构化日志；测试或监控场景可替换为自定义实现。
//!
use super::dispatcher::HandlerFailure;
use crate::error::QueueError;
use crate::event::Event;
use crate::queue::{MembershipEvent, QueueName};
use std::time::Duration;
use tracing::{error, info, warn};

pub trait FailureReporter: Send + Sync {
    /// 可重试的出队失败，`attempt` 从 1 开始，`retry_in` 为本次退避时长
    fn transient_dequeue_failure(
        &self,
        _queue: &QueueName,
        _error: &QueueError,
        _attempt: u32,
        _retry_in: Duration,
    ) {
    }

    /// 致命的出队失败，消费循环随后退出
    fn fatal_dequeue_failure(&self, _queue: &QueueName, _error: &QueueError) {}

    /// 单个处理器失败（返回错误或 panic）
    fn handler_failure(&self, _queue: &QueueName, _event: &Event, _failure: &HandlerFailure) {}

    fn membership_changed(&self, _queue: &QueueName, _event: &MembershipEvent) {}
}

/// 基于 tracing 的默认上报实现
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn transient_dequeue_failure(
        &self,
        queue: &QueueName,
        error: &QueueError,
        attempt: u32,
        retry_in: Duration,
    ) {
        warn!(
            queue = %queue,
            attempt,
            retry_in_ms = retry_in.as_millis() as u64,
            error = %error,
            "dequeue failed, retrying"
        );
    }

    fn fatal_dequeue_failure(&self, queue: &QueueName, error: &QueueError) {
        error!(queue = %queue, error = %error, "dequeue failed permanently, consume loop exiting");
    }

    fn handler_failure(&self, queue: &QueueName, event: &Event, failure: &HandlerFailure) {
        warn!(
            queue = %queue,
            event_id = event.event_id(),
            event_type = event.event_type(),
            handler = %failure.handler,
            panicked = failure.panicked,
            reason = %failure.reason,
            "event handler failed"
        );
    }

    fn membership_changed(&self, queue: &QueueName, event: &MembershipEvent) {
        match event {
            MembershipEvent::MemberJoined { node_id } => {
                info!(queue = %queue, node_id = %node_id, "cluster member joined");
            }
            MembershipEvent::MemberLeft { node_id } => {
                info!(queue = %queue, node_id = %node_id, "cluster member left");
            }
        }
    }
}
