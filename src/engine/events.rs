// ==========================================
// 生产执行系统 - 引擎层事件发布
// ==========================================
// 职责: 定义流转事件发布 trait,通知下游（看板/消息推送）
// 说明: 仅在事务提交后发布; 发布失败只记录日志,不影响已提交的写入
// ==========================================

use crate::domain::types::{BatchStatus, WorkOrderStatus};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 流转事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent {
    /// 工单状态变更
    WorkOrderStatusChanged {
        work_order_id: String,
        from: WorkOrderStatus,
        to: WorkOrderStatus,
    },
    /// 批次状态变更
    BatchStatusChanged {
        batch_id: String,
        from: Option<BatchStatus>,
        to: BatchStatus,
        members: Vec<String>,
    },
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkOrderStatusChanged { .. } => "WorkOrderStatusChanged",
            WorkflowEvent::BatchStatusChanged { .. } => "BatchStatusChanged",
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================
pub trait WorkflowEventPublisher: Send + Sync {
    fn publish(&self, event: WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl WorkflowEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(event = event.name(), "NoOpEventPublisher: 跳过事件发布");
        Ok(())
    }
}

/// 可选的事件发布者包装
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn WorkflowEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn WorkflowEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// 逐条发布; 失败记录 warn 后继续
    pub fn publish_all(&self, events: Vec<WorkflowEvent>) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(count = events.len(), "未配置发布者,跳过事件");
            return;
        };
        for event in events {
            let name = event.name();
            if let Err(e) = publisher.publish(event) {
                tracing::warn!(event = name, error = %e, "流转事件发布失败");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DepartmentType;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<WorkflowEvent>>);

    impl WorkflowEventPublisher for Recording {
        fn publish(&self, event: WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Failing;

    impl WorkflowEventPublisher for Failing {
        fn publish(&self, _event: WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("downstream unavailable".into())
        }
    }

    fn status_event() -> WorkflowEvent {
        WorkflowEvent::WorkOrderStatusChanged {
            work_order_id: "WO-1".to_string(),
            from: WorkOrderStatus::Created,
            to: WorkOrderStatus::InDepartment(DepartmentType::Cleanroom),
        }
    }

    #[test]
    fn test_optional_publisher_delivers_in_order() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let publisher = OptionalEventPublisher::with_publisher(recording.clone());
        assert!(publisher.is_configured());

        let batch_event = WorkflowEvent::BatchStatusChanged {
            batch_id: "B-1".to_string(),
            from: None,
            to: BatchStatus::Draft,
            members: vec!["WO-1".to_string()],
        };
        publisher.publish_all(vec![status_event(), batch_event.clone()]);

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], batch_event);
    }

    #[test]
    fn test_publish_failures_are_swallowed() {
        OptionalEventPublisher::with_publisher(Arc::new(Failing)).publish_all(vec![status_event()]);
        OptionalEventPublisher::none().publish_all(vec![status_event()]);
        assert!(NoOpEventPublisher.publish(status_event()).is_ok());
    }
}
