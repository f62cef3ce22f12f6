// ==========================================
// 生产执行系统 - 工单领域模型
// ==========================================
// 红线: 工单只由流转引擎与批次管理器修改,永不删除,只会进入终态
// 对齐: work_order 表
// ==========================================

use crate::domain::types::{Priority, WorkOrderStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Dimensions - 外形尺寸
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Dimensions {
    pub fn new(length_mm: f64, width_mm: f64, height_mm: f64) -> Self {
        Self {
            length_mm,
            width_mm,
            height_mm,
        }
    }

    /// 体积（立方米）
    pub fn volume_m3(&self) -> f64 {
        (self.length_mm * self.width_mm * self.height_mm) / 1_000_000_000.0
    }
}

// ==========================================
// WorkOrder - 工单 (ODL)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    // ===== 主键 =====
    pub work_order_id: String, // 工单号

    // ===== 产品信息 =====
    pub product_code: String,         // 产品/零件号
    pub product_type: Option<String>, // 产品类型（路由表键）
    pub quantity: i32,
    pub priority: Priority,

    // ===== 流转状态 =====
    pub status: WorkOrderStatus,
    pub hold_previous_status: Option<WorkOrderStatus>, // 暂停(ON_HOLD)前状态

    // ===== 工艺属性 =====
    pub dimensions: Option<Dimensions>,
    pub cure_recipe_id: Option<String>, // 指定固化工艺

    // ===== 时间信息 =====
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl WorkOrder {
    /// 新建工单（状态固定为 CREATED）
    pub fn new(work_order_id: impl Into<String>, product_code: impl Into<String>, quantity: i32) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            work_order_id: work_order_id.into(),
            product_code: product_code.into(),
            product_type: None,
            quantity,
            priority: Priority::Normal,
            status: WorkOrderStatus::Created,
            hold_previous_status: None,
            dimensions: None,
            cure_recipe_id: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}
