// ==========================================
// 生产执行系统 - 领域类型定义
// ==========================================
// 职责: 工单状态、部门类型、事件类型、批次状态等封闭枚举
// 红线: 状态一律为封闭和类型,禁止在引擎内做字符串匹配
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单优先级 (Priority)
// ==========================================
// 顺序: Low < Normal < High < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "NORMAL" => Some(Priority::Normal),
            "HIGH" => Some(Priority::High),
            "URGENT" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 部门类型 (Department Type)
// ==========================================
// 固定目录; 热压罐为批次闸控部门
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepartmentType {
    Cleanroom,      // 净化间（铺层）
    Autoclave,      // 热压罐固化
    NumericControl, // 数控加工
    Ndi,            // 无损检测
    Assembly,       // 装配
    Painting,       // 喷涂
    QualityControl, // 质检
    Honeycomb,      // 蜂窝芯加工
    Engines,        // 发动机部件
}

impl DepartmentType {
    pub const ALL: [DepartmentType; 9] = [
        DepartmentType::Cleanroom,
        DepartmentType::Autoclave,
        DepartmentType::NumericControl,
        DepartmentType::Ndi,
        DepartmentType::Assembly,
        DepartmentType::Painting,
        DepartmentType::QualityControl,
        DepartmentType::Honeycomb,
        DepartmentType::Engines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepartmentType::Cleanroom => "CLEANROOM",
            DepartmentType::Autoclave => "AUTOCLAVE",
            DepartmentType::NumericControl => "NUMERIC_CONTROL",
            DepartmentType::Ndi => "NDI",
            DepartmentType::Assembly => "ASSEMBLY",
            DepartmentType::Painting => "PAINTING",
            DepartmentType::QualityControl => "QUALITY_CONTROL",
            DepartmentType::Honeycomb => "HONEYCOMB",
            DepartmentType::Engines => "ENGINES",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// 闸控部门: EXIT 可能被批次级推进取代
    pub fn is_batch_gated(&self) -> bool {
        matches!(self, DepartmentType::Autoclave)
    }
}

impl fmt::Display for DepartmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 工单状态 (Work Order Status)
// ==========================================
// 两个正交轴: 部门类型 × 阶段(进行中/已完成), 另加终态与特殊态
// 数据库存储: CREATED / IN_<DEPT> / <DEPT>_COMPLETED / COMPLETED / ON_HOLD / CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkOrderStatus {
    Created,
    InDepartment(DepartmentType),
    DepartmentCompleted(DepartmentType),
    Completed,
    OnHold,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn to_db_string(&self) -> String {
        match self {
            WorkOrderStatus::Created => "CREATED".to_string(),
            WorkOrderStatus::InDepartment(t) => format!("IN_{}", t.as_str()),
            WorkOrderStatus::DepartmentCompleted(t) => format!("{}_COMPLETED", t.as_str()),
            WorkOrderStatus::Completed => "COMPLETED".to_string(),
            WorkOrderStatus::OnHold => "ON_HOLD".to_string(),
            WorkOrderStatus::Cancelled => "CANCELLED".to_string(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        match s.as_str() {
            "CREATED" => return Some(WorkOrderStatus::Created),
            "COMPLETED" => return Some(WorkOrderStatus::Completed),
            "ON_HOLD" => return Some(WorkOrderStatus::OnHold),
            "CANCELLED" => return Some(WorkOrderStatus::Cancelled),
            _ => {}
        }
        if let Some(dept) = s.strip_prefix("IN_") {
            return DepartmentType::parse(dept).map(WorkOrderStatus::InDepartment);
        }
        if let Some(dept) = s.strip_suffix("_COMPLETED") {
            return DepartmentType::parse(dept).map(WorkOrderStatus::DepartmentCompleted);
        }
        None
    }

    /// 终态/特殊态: 除 NOTE 外不允许任何部门动作
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkOrderStatus::Completed | WorkOrderStatus::OnHold | WorkOrderStatus::Cancelled
        )
    }

    pub fn department_type(&self) -> Option<DepartmentType> {
        match self {
            WorkOrderStatus::InDepartment(t) | WorkOrderStatus::DepartmentCompleted(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

impl TryFrom<String> for WorkOrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WorkOrderStatus::parse(&value).ok_or_else(|| format!("未知的工单状态: {}", value))
    }
}

impl From<WorkOrderStatus> for String {
    fn from(status: WorkOrderStatus) -> Self {
        status.to_db_string()
    }
}

// ==========================================
// 生产事件类型 (Event Kind)
// ==========================================
// ASSIGNED / UNASSIGNED 仅由系统产生(入批/出批并恢复入批前状态), 调用方不可请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Entry,
    Exit,
    Pause,
    Resume,
    Note,
    Assigned,
    Unassigned,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Entry => "ENTRY",
            EventKind::Exit => "EXIT",
            EventKind::Pause => "PAUSE",
            EventKind::Resume => "RESUME",
            EventKind::Note => "NOTE",
            EventKind::Assigned => "ASSIGNED",
            EventKind::Unassigned => "UNASSIGNED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENTRY" => Some(EventKind::Entry),
            "EXIT" => Some(EventKind::Exit),
            "PAUSE" => Some(EventKind::Pause),
            "RESUME" => Some(EventKind::Resume),
            "NOTE" => Some(EventKind::Note),
            "ASSIGNED" => Some(EventKind::Assigned),
            "UNASSIGNED" => Some(EventKind::Unassigned),
            _ => None,
        }
    }

    /// 调用方可请求的动作
    pub fn is_requestable(&self) -> bool {
        !matches!(self, EventKind::Assigned | EventKind::Unassigned)
    }

    /// 出批标记: 之前的部门内区间全部作废,可重新 ENTRY
    pub fn ends_membership(&self) -> bool {
        matches!(self, EventKind::Unassigned)
    }

    /// 是否改变部门内的进出状态（NOTE/ASSIGNED/UNASSIGNED 不改变）
    pub fn is_state_bearing(&self) -> bool {
        matches!(
            self,
            EventKind::Entry | EventKind::Exit | EventKind::Pause | EventKind::Resume
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 固化批次状态 (Curing Batch Status)
// ==========================================
// DRAFT → READY → IN_CURE → COMPLETED → RELEASED
// CANCELLED 可由 DRAFT/READY/IN_CURE 进入, 仅可回到 DRAFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Draft,
    Ready,
    InCure,
    Completed,
    Released,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "DRAFT",
            BatchStatus::Ready => "READY",
            BatchStatus::InCure => "IN_CURE",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Released => "RELEASED",
            BatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(BatchStatus::Draft),
            "READY" => Some(BatchStatus::Ready),
            "IN_CURE" => Some(BatchStatus::InCure),
            "COMPLETED" => Some(BatchStatus::Completed),
            "RELEASED" => Some(BatchStatus::Released),
            "CANCELLED" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }

    /// 状态转换表
    pub fn can_transition_to(&self, target: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, target),
            (Draft, Ready)
                | (Ready, InCure)
                | (InCure, Completed)
                | (Completed, Released)
                | (Draft, Cancelled)
                | (Ready, Cancelled)
                | (InCure, Cancelled)
                | (Cancelled, Draft)
        )
    }

    /// 进入该状态是否需要实物扫码确认
    pub fn requires_scan(&self) -> bool {
        matches!(
            self,
            BatchStatus::InCure | BatchStatus::Completed | BatchStatus::Released
        )
    }

    /// 活动批次: 成员关系仍然有效
    pub fn is_active(&self) -> bool {
        !matches!(self, BatchStatus::Released | BatchStatus::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 操作者 (Actor)
// ==========================================
// 系统自动事件使用 System, 不依赖魔法字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Human(String),
    System,
}

impl Actor {
    pub fn human(id: impl Into<String>) -> Self {
        Actor::Human(id.into())
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self, Actor::System)
    }

    /// 数据库存储的操作人ID（系统为 None）
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::Human(id) => Some(id.as_str()),
            Actor::System => None,
        }
    }

    pub fn from_db(user_id: Option<String>) -> Self {
        match user_id {
            Some(id) => Actor::Human(id),
            None => Actor::System,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Human(id) => write!(f, "{}", id),
            Actor::System => write!(f, "SYSTEM"),
        }
    }
}
