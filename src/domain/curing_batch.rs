// ==========================================
// 生产执行系统 - 固化批次（热压罐装载）领域模型
// ==========================================
// 红线: 批次永不删除, CANCELLED 为终止态而非移除
// 对齐: curing_batch / batch_item 表
// ==========================================

use crate::domain::types::{BatchStatus, WorkOrderStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PlannedWindow - 计划占用时间窗
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PlannedWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// 半开区间重叠判定
    pub fn overlaps(&self, other: &PlannedWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ==========================================
// CuringBatch - 固化批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuringBatch {
    pub batch_id: String,
    pub load_number: String, // 装载号
    pub status: BatchStatus,
    pub autoclave_id: String,
    pub recipe_id: String,
    pub planned_window: PlannedWindow,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// BatchItem - 批次成员
// ==========================================
// previous_status: 入批前状态,移除/取消时据此确定性恢复
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub batch_id: String,
    pub work_order_id: String,
    pub previous_status: WorkOrderStatus,
    pub added_at: NaiveDateTime,
}
