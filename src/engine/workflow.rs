// ==========================================
// 生产执行系统 - 工单流转引擎
// ==========================================
// 职责: 单工单动作编排
//   权限 → 加载工单/部门/部门内事件 → 重放校验 → 合法性校验
//   → 批次 EXIT 闸门 → 追加事件 → 状态变更 → 自动转序 → 刷新修改时间
// 红线: 以上步骤在同一个写事务内完成,任何一步失败整体回滚
//       (自动转序失败除外: 转为告警, EXIT 事件照常保留)
// ==========================================

use crate::config::{ConfigManager, WorkflowSettings};
use crate::db::UnitOfWork;
use crate::domain::department::Department;
use crate::domain::production_event::{ActionMetadata, NewProductionEvent, ProductionEvent, StatusChange};
use crate::domain::types::{Actor, BatchStatus, EventKind, WorkOrderStatus};
use crate::domain::work_order::WorkOrder;
use crate::engine::capability::{ActorContext, CapabilityChecker};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent, WorkflowEventPublisher};
use crate::engine::routing::{AutoRouter, RouteOutcome};
use crate::engine::transition::{active_duration_minutes, legal_actions, replay_events};
use crate::repository::{
    AutoclaveRepository, CuringBatchRepository, DepartmentRepository, ProductionEventRepository, WorkOrderRepository,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ==========================================
// 请求与结果
// ==========================================

#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub work_order_id: String,
    pub department_id: String,
    pub action: EventKind,
    pub notes: Option<String>,
    pub metadata: ActionMetadata,
    /// 批次固化中仍强制单件转出
    pub force_transfer: bool,
}

impl ActionRequest {
    pub fn new(work_order_id: impl Into<String>, department_id: impl Into<String>, action: EventKind) -> Self {
        Self {
            work_order_id: work_order_id.into(),
            department_id: department_id.into(),
            action,
            notes: None,
            metadata: ActionMetadata::default(),
            force_transfer: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub event: ProductionEvent,
    pub status_before: WorkOrderStatus,
    pub status_after: WorkOrderStatus,
    pub auto_transfer: Option<RouteOutcome>,
    pub warnings: Vec<String>,
}

/// 合法动作只读投影
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableActions {
    pub work_order_id: String,
    pub department_id: String,
    pub current_status: WorkOrderStatus,
    pub last_event: Option<ProductionEvent>,
    pub available_actions: Vec<EventKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderTimeline {
    pub work_order: WorkOrder,
    pub events: Vec<ProductionEvent>,
    pub status_history: Vec<StatusChange>,
}

/// 显式状态转换（部门动作之外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusOverride {
    Complete,
    Hold,
    ReleaseHold,
    Cancel,
}

impl StatusOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusOverride::Complete => "COMPLETE",
            StatusOverride::Hold => "HOLD",
            StatusOverride::ReleaseHold => "RELEASE_HOLD",
            StatusOverride::Cancel => "CANCEL",
        }
    }
}

// ==========================================
// WorkflowEngine - 流转引擎
// ==========================================
pub struct WorkflowEngine {
    uow: Arc<UnitOfWork>,
    config: Arc<ConfigManager>,
    capability: Arc<dyn CapabilityChecker>,
    publisher: OptionalEventPublisher,
}

impl WorkflowEngine {
    pub fn new(
        uow: Arc<UnitOfWork>,
        config: Arc<ConfigManager>,
        capability: Arc<dyn CapabilityChecker>,
    ) -> Self {
        Self {
            uow,
            config,
            capability,
            publisher: OptionalEventPublisher::none(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn WorkflowEventPublisher>) -> Self {
        self.publisher = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    // ==========================================
    // 部门动作
    // ==========================================

    /// 执行一个部门动作
    ///
    /// # 错误
    /// - `Capability`: 操作者无目标部门权限
    /// - `NotFound`: 工单或部门不存在
    /// - `Validation`: 当前状态下动作非法（携带合法动作列表）
    /// - `Integrity`: 部门内历史事件序列不一致
    /// - `Conflict`: 事务竞争,可重试
    pub fn perform_action(&self, actor: &ActorContext, req: &ActionRequest) -> WorkflowResult<ActionOutcome> {
        if !req.action.is_requestable() {
            return Err(WorkflowError::validation(format!(
                "{}只能由系统产生",
                req.action
            )));
        }

        // 写事务开始前读取设置,避免重入共享连接
        let settings = self.config.settings()?;
        let now = chrono::Utc::now().naive_utc();

        let outcome = self.uow.execute("perform_action", |tx| {
            self.perform_action_in_tx(tx, actor, req, &settings, now)
        })?;

        info!(
            work_order_id = %req.work_order_id,
            department_id = %req.department_id,
            action = %req.action,
            actor = %actor.user_id,
            from = %outcome.status_before,
            to = %outcome.status_after,
            event_id = outcome.event.event_id,
            "部门动作已提交"
        );
        for w in &outcome.warnings {
            warn!(work_order_id = %req.work_order_id, warning = %w, "部门动作告警");
        }

        let mut events = Vec::new();
        if outcome.status_before != outcome.status_after {
            events.push(WorkflowEvent::WorkOrderStatusChanged {
                work_order_id: req.work_order_id.clone(),
                from: outcome.status_before,
                to: outcome.status_after,
            });
        }
        self.publisher.publish_all(events);

        Ok(outcome)
    }

    fn perform_action_in_tx(
        &self,
        conn: &Connection,
        actor: &ActorContext,
        req: &ActionRequest,
        settings: &WorkflowSettings,
        now: NaiveDateTime,
    ) -> WorkflowResult<ActionOutcome> {
        let dept = self.load_department(conn, actor, &req.department_id)?;
        let wo = WorkOrderRepository::find_by_id(conn, &req.work_order_id)?
            .ok_or_else(|| WorkflowError::not_found("WorkOrder", &req.work_order_id))?;

        let history = ProductionEventRepository::find_for_department(conn, &wo.work_order_id, &dept.department_id)?;
        let last = replay_events(&history).map_err(|msg| {
            error!(work_order_id = %wo.work_order_id, department_id = %dept.department_id, %msg, "事件序列不一致");
            WorkflowError::Integrity(msg)
        })?;

        let legal = legal_actions(wo.status, dept.department_type, last);
        if !legal.contains(&req.action) {
            return Err(WorkflowError::illegal_action(&wo.work_order_id, wo.status, req.action, legal));
        }

        let mut warnings = Vec::new();

        // 批次 EXIT 闸门: 仅限批次所属热压罐的部门
        let mut routing_deferred = false;
        if req.action == EventKind::Exit && dept.department_type.is_batch_gated() {
            if let Some((batch, _)) = CuringBatchRepository::find_active_by_work_order(conn, &wo.work_order_id)? {
                let same_department = AutoclaveRepository::find_by_id(conn, &batch.autoclave_id)?
                    .is_some_and(|a| a.department_id == dept.department_id);
                if same_department && matches!(batch.status, BatchStatus::InCure | BatchStatus::Completed) {
                    if req.force_transfer {
                        warnings.push(format!(
                            "强制转出: 批次{}仍为{},批次与工单状态已不一致",
                            batch.load_number, batch.status
                        ));
                    } else {
                        routing_deferred = true;
                        warnings.push(format!(
                            "工单属于批次{}({}),转序等待批次释放",
                            batch.load_number, batch.status
                        ));
                    }
                }
            }
        }

        let duration_minutes = match req.metadata.duration_minutes {
            Some(d) => Some(d),
            None if req.action == EventKind::Exit && settings.autofill_exit_duration => {
                let spans: Vec<(EventKind, NaiveDateTime)> =
                    history.iter().map(|e| (e.kind, e.event_ts)).collect();
                Some(active_duration_minutes(&spans, now))
            }
            None => None,
        };

        let mut new_event = NewProductionEvent::new(
            wo.work_order_id.as_str(),
            dept.department_id.as_str(),
            actor.actor(),
            req.action,
        )
        .with_notes(req.notes.clone())
        .with_duration(duration_minutes)
        .with_batch(req.metadata.batch_id.clone());
        new_event.event_ts = now;
        let event = ProductionEventRepository::append(conn, &new_event)?;

        let target = match req.action {
            EventKind::Entry => Some(WorkOrderStatus::InDepartment(dept.department_type)),
            EventKind::Exit => Some(WorkOrderStatus::DepartmentCompleted(dept.department_type)),
            _ => None,
        };
        let mut status_after = wo.status;
        if let Some(target) = target.filter(|t| *t != wo.status) {
            WorkOrderRepository::update_status(
                conn,
                &wo.work_order_id,
                wo.status,
                target,
                &actor.actor(),
                req.action.as_str(),
                now,
            )?;
            status_after = target;
        }

        let mut auto_transfer = None;
        if req.action == EventKind::Exit && !routing_deferred {
            let outcome = match AutoRouter::route(conn, &wo.work_order_id, &Actor::System, now) {
                Ok(outcome) => outcome,
                Err(e @ WorkflowError::Conflict(_)) => return Err(e),
                Err(e) => {
                    warn!(work_order_id = %wo.work_order_id, error = %e, "自动转序失败");
                    RouteOutcome {
                        success: false,
                        next_department: None,
                        next_department_id: None,
                        new_status: None,
                        message: Some(e.to_string()),
                    }
                }
            };
            if !outcome.success {
                warnings.push(format!(
                    "自动转序未完成: {}",
                    outcome.message.as_deref().unwrap_or("未知原因")
                ));
            }
            if let Some(s) = outcome.new_status {
                status_after = s;
            }
            auto_transfer = Some(outcome);
        }

        WorkOrderRepository::touch(conn, &wo.work_order_id, now)?;

        Ok(ActionOutcome {
            event,
            status_before: wo.status,
            status_after,
            auto_transfer,
            warnings,
        })
    }

    /// 加载部门并校验权限（部门不存在先于权限判定）
    fn load_department(&self, conn: &Connection, actor: &ActorContext, department_id: &str) -> WorkflowResult<Department> {
        let dept = DepartmentRepository::find_by_id(conn, department_id)?
            .ok_or_else(|| WorkflowError::not_found("Department", department_id))?;
        if !self.capability.can_operate(actor, &dept) {
            return Err(WorkflowError::Capability {
                actor: actor.user_id.clone(),
                department_id: department_id.to_string(),
            });
        }
        Ok(dept)
    }

    // ==========================================
    // 只读查询
    // ==========================================

    /// 合法动作投影（不修改任何状态）
    pub fn available_actions(&self, work_order_id: &str, department_id: &str) -> WorkflowResult<AvailableActions> {
        self.uow.read(|conn| {
            let dept = DepartmentRepository::find_by_id(conn, department_id)?
                .ok_or_else(|| WorkflowError::not_found("Department", department_id))?;
            let wo = WorkOrderRepository::find_by_id(conn, work_order_id)?
                .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;
            let history = ProductionEventRepository::find_for_department(conn, work_order_id, department_id)?;
            let last_state = replay_events(&history).map_err(WorkflowError::Integrity)?;

            Ok(AvailableActions {
                work_order_id: wo.work_order_id,
                department_id: dept.department_id,
                current_status: wo.status,
                last_event: history.last().cloned(),
                available_actions: legal_actions(wo.status, dept.department_type, last_state),
            })
        })
    }

    /// 工单时间线: 全部事件 + 状态变更历史
    pub fn timeline(&self, work_order_id: &str) -> WorkflowResult<WorkOrderTimeline> {
        self.uow.read(|conn| {
            let work_order = WorkOrderRepository::find_by_id(conn, work_order_id)?
                .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;
            Ok(WorkOrderTimeline {
                events: ProductionEventRepository::find_by_work_order(conn, work_order_id)?,
                status_history: WorkOrderRepository::status_history(conn, work_order_id)?,
                work_order,
            })
        })
    }

    // ==========================================
    // 显式状态转换
    // ==========================================

    /// 标记完工（仅限部门完成态）
    pub fn complete(&self, actor: &ActorContext, work_order_id: &str, reason: Option<&str>) -> WorkflowResult<StatusChange> {
        self.override_status(actor, work_order_id, StatusOverride::Complete, reason)
    }

    pub fn hold(&self, actor: &ActorContext, work_order_id: &str, reason: Option<&str>) -> WorkflowResult<StatusChange> {
        self.override_status(actor, work_order_id, StatusOverride::Hold, reason)
    }

    pub fn release_hold(&self, actor: &ActorContext, work_order_id: &str, reason: Option<&str>) -> WorkflowResult<StatusChange> {
        self.override_status(actor, work_order_id, StatusOverride::ReleaseHold, reason)
    }

    pub fn cancel(&self, actor: &ActorContext, work_order_id: &str, reason: Option<&str>) -> WorkflowResult<StatusChange> {
        self.override_status(actor, work_order_id, StatusOverride::Cancel, reason)
    }

    pub fn override_status(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
        op: StatusOverride,
        reason: Option<&str>,
    ) -> WorkflowResult<StatusChange> {
        if !actor.can_override() {
            return Err(WorkflowError::Capability {
                actor: actor.user_id.clone(),
                department_id: "*".to_string(),
            });
        }
        let now = chrono::Utc::now().naive_utc();
        let reason = match reason {
            Some(r) if !r.trim().is_empty() => format!("{}: {}", op.as_str(), r.trim()),
            _ => op.as_str().to_string(),
        };

        let change = self.uow.execute("override_status", |tx| {
            let wo = WorkOrderRepository::find_by_id(tx, work_order_id)?
                .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;

            let rejected = || WorkflowError::Validation {
                message: format!("工单{}当前状态{}不允许{}", work_order_id, wo.status, op.as_str()),
                current_status: Some(wo.status.to_db_string()),
                requested: Some(op.as_str().to_string()),
                legal_actions: Vec::new(),
                offending_ids: vec![work_order_id.to_string()],
            };

            let target = match (op, wo.status) {
                (StatusOverride::Complete, WorkOrderStatus::DepartmentCompleted(_)) => WorkOrderStatus::Completed,
                (StatusOverride::Hold, s) if !s.is_terminal() => WorkOrderStatus::OnHold,
                (StatusOverride::ReleaseHold, WorkOrderStatus::OnHold) => wo.hold_previous_status.ok_or_else(|| {
                    WorkflowError::Integrity(format!("工单{}处于ON_HOLD但缺少挂起前状态", work_order_id))
                })?,
                (StatusOverride::Cancel, s) if !matches!(s, WorkOrderStatus::Completed | WorkOrderStatus::Cancelled) => {
                    WorkOrderStatus::Cancelled
                }
                _ => return Err(rejected()),
            };

            if op != StatusOverride::ReleaseHold {
                if let Some((batch, _)) = CuringBatchRepository::find_active_by_work_order(tx, work_order_id)? {
                    return Err(WorkflowError::rejected_members(
                        format!("工单{}属于活动批次{},请先移出批次", work_order_id, batch.load_number),
                        vec![work_order_id.to_string()],
                    ));
                }
            }

            match op {
                StatusOverride::Hold => WorkOrderRepository::set_hold_previous_status(tx, work_order_id, Some(wo.status))?,
                StatusOverride::ReleaseHold => WorkOrderRepository::set_hold_previous_status(tx, work_order_id, None)?,
                _ => {}
            }
            WorkOrderRepository::update_status(tx, work_order_id, wo.status, target, &actor.actor(), &reason, now)?;

            Ok(StatusChange {
                work_order_id: work_order_id.to_string(),
                from_status: wo.status,
                to_status: target,
                actor: actor.actor(),
                reason: reason.clone(),
                changed_at: now,
            })
        })?;

        info!(
            work_order_id,
            op = op.as_str(),
            from = %change.from_status,
            to = %change.to_status,
            actor = %actor.user_id,
            "工单状态已变更"
        );
        self.publisher.publish_all(vec![WorkflowEvent::WorkOrderStatusChanged {
            work_order_id: work_order_id.to_string(),
            from: change.from_status,
            to: change.to_status,
        }]);
        Ok(change)
    }
}
