// ==========================================
// 生产执行系统 - 生产事件领域模型
// ==========================================
// 红线: 事件日志只追加,不修改,不删除
// 对齐: production_event 表
// ==========================================

use crate::domain::types::{Actor, EventKind, WorkOrderStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionEvent - 生产事件（不可变）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub event_id: i64, // 单调递增,同一时间戳内的次序依据
    pub work_order_id: String,
    pub department_id: String,
    pub actor: Actor,
    pub kind: EventKind,
    pub event_ts: NaiveDateTime,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub batch_id: Option<String>,
}

impl ProductionEvent {
    pub fn is_automatic(&self) -> bool {
        self.actor.is_automatic()
    }
}

// ==========================================
// NewProductionEvent - 待追加事件
// ==========================================
#[derive(Debug, Clone)]
pub struct NewProductionEvent {
    pub work_order_id: String,
    pub department_id: String,
    pub actor: Actor,
    pub kind: EventKind,
    pub event_ts: NaiveDateTime,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub batch_id: Option<String>,
}

impl NewProductionEvent {
    pub fn new(
        work_order_id: impl Into<String>,
        department_id: impl Into<String>,
        actor: Actor,
        kind: EventKind,
    ) -> Self {
        Self {
            work_order_id: work_order_id.into(),
            department_id: department_id.into(),
            actor,
            kind,
            event_ts: chrono::Utc::now().naive_utc(),
            duration_minutes: None,
            notes: None,
            batch_id: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_duration(mut self, minutes: Option<i64>) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn with_batch(mut self, batch_id: Option<String>) -> Self {
        self.batch_id = batch_id;
        self
    }
}

// ==========================================
// ActionMetadata - 动作附加信息
// ==========================================
// 固定结构,只有两个可选字段会被读取
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub duration_minutes: Option<i64>,
    pub batch_id: Option<String>,
}

// ==========================================
// StatusChange - 工单状态变更审计
// ==========================================
// 对齐: work_order_status_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub work_order_id: String,
    pub from_status: WorkOrderStatus,
    pub to_status: WorkOrderStatus,
    pub actor: Actor,
    pub reason: String,
    pub changed_at: NaiveDateTime,
}
