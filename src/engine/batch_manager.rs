// ==========================================
// 生产执行系统 - 固化批次管理
// ==========================================
// 职责: 批次生命周期（创建/推进/移出成员/查询）
// 状态机: DRAFT → READY → IN_CURE → COMPLETED → RELEASED
//         DRAFT/READY/IN_CURE → CANCELLED → DRAFT
// 红线: 批次状态与全部成员的状态变更在同一事务内完成,
//       任一成员不符合预期则整体中止,不更新任何成员
// ==========================================

use crate::config::{ConfigManager, WorkflowSettings};
use crate::db::UnitOfWork;
use crate::domain::curing_batch::{BatchItem, CuringBatch, PlannedWindow};
use crate::domain::department::{Autoclave, Department};
use crate::domain::production_event::NewProductionEvent;
use crate::domain::types::{Actor, BatchStatus, DepartmentType, EventKind, WorkOrderStatus};
use crate::engine::capability::{ActorContext, CapabilityChecker};
use crate::engine::compatibility::{self, CompatibilityReport};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent, WorkflowEventPublisher};
use crate::engine::transition::{active_duration_minutes, replay_events};
use crate::repository::{
    AutoclaveRepository, CureRecipeRepository, CuringBatchRepository, DepartmentRepository,
    ProductionEventRepository, WorkOrderRepository,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const IN_AUTOCLAVE: WorkOrderStatus = WorkOrderStatus::InDepartment(DepartmentType::Autoclave);
const AUTOCLAVE_COMPLETED: WorkOrderStatus = WorkOrderStatus::DepartmentCompleted(DepartmentType::Autoclave);

// ==========================================
// 请求与结果
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub autoclave_id: String,
    pub recipe_id: String,
    pub planned_window: PlannedWindow,
    pub work_order_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreation {
    pub batch: CuringBatch,
    pub items: Vec<BatchItem>,
    pub report: CompatibilityReport,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAdvance {
    pub batch: CuringBatch,
    pub previous_status: BatchStatus,
    /// 本次状态被修改的成员工单
    pub work_order_updates: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRemoval {
    pub batch_id: String,
    pub work_order_id: String,
    /// 恢复后的状态; 成员已被单件转出时为 None
    pub restored_status: Option<WorkOrderStatus>,
    pub warnings: Vec<String>,
}

/// 批次详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetail {
    pub batch: CuringBatch,
    pub items: Vec<BatchItem>,
}

// ==========================================
// BatchManager - 批次管理器
// ==========================================
pub struct BatchManager {
    uow: Arc<UnitOfWork>,
    config: Arc<ConfigManager>,
    capability: Arc<dyn CapabilityChecker>,
    publisher: OptionalEventPublisher,
}

impl BatchManager {
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
    // 创建
    // ==========================================

    /// 创建 DRAFT 批次并把成员置为 IN_AUTOCLAVE
    ///
    /// 兼容性检查失败时无任何写入
    pub fn create(&self, actor: &ActorContext, req: &CreateBatchRequest) -> WorkflowResult<BatchCreation> {
        if req.work_order_ids.is_empty() {
            return Err(WorkflowError::validation("批次至少需要一个工单"));
        }
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = req
            .work_order_ids
            .iter()
            .filter(|id| !seen.insert(id.as_str()))
            .cloned()
            .collect();
        if !duplicates.is_empty() {
            return Err(WorkflowError::rejected_members("工单列表存在重复", duplicates));
        }
        if !req.planned_window.is_valid() {
            return Err(WorkflowError::validation(format!(
                "计划结束时间{}必须晚于开始时间{}",
                req.planned_window.end, req.planned_window.start
            )));
        }

        let settings = self.config.settings()?;
        let now = chrono::Utc::now().naive_utc();

        let creation = self.uow.execute("create_batch", |tx| {
            let (autoclave, _) = self.load_autoclave(tx, actor, &req.autoclave_id)?;
            if !autoclave.is_active {
                return Err(WorkflowError::validation(format!("热压罐{}已停用", autoclave.code)));
            }
            CureRecipeRepository::find_by_id(tx, &req.recipe_id)?
                .ok_or_else(|| WorkflowError::not_found("CureRecipe", &req.recipe_id))?;

            let overlapping =
                CuringBatchRepository::find_overlapping_active(tx, &autoclave.autoclave_id, &req.planned_window, None)?;
            if !overlapping.is_empty() {
                let loads: Vec<String> = overlapping.into_iter().map(|b| b.load_number).collect();
                return Err(WorkflowError::Validation {
                    message: format!("热压罐{}在计划时间窗内已被占用: {}", autoclave.code, loads.join(", ")),
                    current_status: None,
                    requested: None,
                    legal_actions: Vec::new(),
                    offending_ids: loads,
                });
            }

            let work_orders = WorkOrderRepository::find_many(tx, &req.work_order_ids)?;
            let mut in_other_batch = Vec::new();
            for wo in &work_orders {
                if CuringBatchRepository::find_active_by_work_order(tx, &wo.work_order_id)?.is_some() {
                    in_other_batch.push(wo.work_order_id.clone());
                }
            }
            if !in_other_batch.is_empty() {
                return Err(WorkflowError::rejected_members("工单已属于其他活动批次", in_other_batch));
            }

            let report = compatibility::check(
                &work_orders,
                &req.recipe_id,
                &autoclave.envelope,
                settings.pre_batch_status,
                settings.capacity_warning_pct,
            )
            .map_err(|rejection| WorkflowError::rejected_members(rejection.to_string(), rejection.offending_ids()))?;

            let batch = CuringBatch {
                batch_id: Uuid::new_v4().to_string(),
                load_number: CuringBatchRepository::next_load_number(tx, &autoclave.code, now.date())?,
                status: BatchStatus::Draft,
                autoclave_id: autoclave.autoclave_id.clone(),
                recipe_id: req.recipe_id.clone(),
                planned_window: req.planned_window,
                actual_start: None,
                actual_end: None,
                created_by: actor.user_id.clone(),
                created_at: now,
                updated_at: now,
            };
            CuringBatchRepository::insert(tx, &batch)?;

            let summary = format!(
                "装载{}: {}件, 利用率{:.1}%",
                batch.load_number,
                work_orders.len(),
                report.utilization_pct
            );
            let mut items = Vec::with_capacity(work_orders.len());
            for wo in &work_orders {
                let item = BatchItem {
                    batch_id: batch.batch_id.clone(),
                    work_order_id: wo.work_order_id.clone(),
                    previous_status: wo.status,
                    added_at: now,
                };
                CuringBatchRepository::insert_item(tx, &item)?;
                Self::assign_member(tx, &batch, &autoclave, wo.work_order_id.as_str(), wo.status, actor, &summary, now)?;
                items.push(item);
            }

            Ok(BatchCreation {
                warnings: report.warnings.clone(),
                batch,
                items,
                report,
            })
        })?;

        info!(
            batch_id = %creation.batch.batch_id,
            load_number = %creation.batch.load_number,
            members = creation.items.len(),
            utilization_pct = creation.report.utilization_pct,
            actor = %actor.user_id,
            "固化批次已创建"
        );
        for w in &creation.warnings {
            warn!(load_number = %creation.batch.load_number, warning = %w, "批次创建告警");
        }

        let mut events = vec![WorkflowEvent::BatchStatusChanged {
            batch_id: creation.batch.batch_id.clone(),
            from: None,
            to: BatchStatus::Draft,
            members: req.work_order_ids.clone(),
        }];
        events.extend(creation.items.iter().map(|item| WorkflowEvent::WorkOrderStatusChanged {
            work_order_id: item.work_order_id.clone(),
            from: item.previous_status,
            to: IN_AUTOCLAVE,
        }));
        self.publisher.publish_all(events);

        Ok(creation)
    }

    /// 成员置为 IN_AUTOCLAVE 并追加系统 ASSIGNED 事件
    ///
    /// 每个成员各记一条（而非整批一条）: 事件按工单+部门存储,
    /// 每个成员的时间线都需要看到本次装载摘要
    #[allow(clippy::too_many_arguments)]
    fn assign_member(
        conn: &Connection,
        batch: &CuringBatch,
        autoclave: &Autoclave,
        work_order_id: &str,
        current: WorkOrderStatus,
        actor: &ActorContext,
        summary: &str,
        now: NaiveDateTime,
    ) -> WorkflowResult<()> {
        WorkOrderRepository::update_status(
            conn,
            work_order_id,
            current,
            IN_AUTOCLAVE,
            &actor.actor(),
            &format!("BATCH_ASSIGN {}", batch.load_number),
            now,
        )?;
        let mut event = NewProductionEvent::new(work_order_id, autoclave.department_id.as_str(), Actor::System, EventKind::Assigned)
            .with_notes(Some(summary.to_string()))
            .with_batch(Some(batch.batch_id.clone()));
        event.event_ts = now;
        ProductionEventRepository::append(conn, &event)?;
        Ok(())
    }

    // ==========================================
    // 推进
    // ==========================================

    /// 推进批次状态并扇出到全部成员
    ///
    /// # 参数
    /// - `scanned_work_order_id`: 进入 IN_CURE/COMPLETED/RELEASED 时必填,必须是当前成员
    pub fn advance(
        &self,
        actor: &ActorContext,
        batch_id: &str,
        target: BatchStatus,
        scanned_work_order_id: Option<&str>,
    ) -> WorkflowResult<BatchAdvance> {
        let settings = self.config.settings()?;
        let now = chrono::Utc::now().naive_utc();

        let (advance, status_events) = self.uow.execute("advance_batch", |tx| {
            self.advance_in_tx(tx, actor, batch_id, target, scanned_work_order_id, &settings, now)
        })?;

        info!(
            batch_id,
            load_number = %advance.batch.load_number,
            from = %advance.previous_status,
            to = %target,
            members_updated = advance.work_order_updates.len(),
            actor = %actor.user_id,
            "批次状态已推进"
        );

        let mut events = vec![WorkflowEvent::BatchStatusChanged {
            batch_id: batch_id.to_string(),
            from: Some(advance.previous_status),
            to: target,
            members: advance.work_order_updates.clone(),
        }];
        events.extend(status_events);
        self.publisher.publish_all(events);

        Ok(advance)
    }

    #[allow(clippy::too_many_arguments)]
    fn advance_in_tx(
        &self,
        conn: &Connection,
        actor: &ActorContext,
        batch_id: &str,
        target: BatchStatus,
        scanned_work_order_id: Option<&str>,
        settings: &WorkflowSettings,
        now: NaiveDateTime,
    ) -> WorkflowResult<(BatchAdvance, Vec<WorkflowEvent>)> {
        let mut batch = CuringBatchRepository::find_by_id(conn, batch_id)?
            .ok_or_else(|| WorkflowError::not_found("CuringBatch", batch_id))?;
        let (autoclave, _) = self.load_autoclave(conn, actor, &batch.autoclave_id)?;

        let previous_status = batch.status;
        if !previous_status.can_transition_to(target) {
            return Err(WorkflowError::invalid_batch_transition(
                &batch.load_number,
                previous_status.as_str(),
                target.as_str(),
            ));
        }

        let items = CuringBatchRepository::find_items(conn, batch_id)?;
        if target.requires_scan() {
            let scanned = scanned_work_order_id
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| WorkflowError::validation(format!("推进到{}需要扫码确认一个成员工单", target)))?;
            if !items.iter().any(|i| i.work_order_id == scanned) {
                return Err(WorkflowError::rejected_members(
                    format!("扫码工单{}不是批次{}的成员", scanned, batch.load_number),
                    vec![scanned.to_string()],
                ));
            }
        }

        let mut fan_out = FanOut::new(conn, &batch, &autoclave, actor, now);
        match target {
            BatchStatus::Ready => fan_out.expect_all(&items, IN_AUTOCLAVE)?,
            BatchStatus::InCure => fan_out.start_cure(&items)?,
            BatchStatus::Completed => fan_out.finish_cure(&items)?,
            BatchStatus::Released => {
                let release_type = settings.release_department_type;
                if DepartmentRepository::find_active_by_type(conn, release_type)?.is_none() {
                    return Err(WorkflowError::validation(format!("释放目标部门类型{}没有启用的部门", release_type)));
                }
                fan_out.release(&items, WorkOrderStatus::InDepartment(release_type))?;
            }
            BatchStatus::Cancelled => fan_out.cancel(&items)?,
            BatchStatus::Draft => fan_out.redraft(&items, settings)?,
        }
        let FanOut { updated, events, .. } = fan_out;

        match target {
            BatchStatus::InCure => batch.actual_start = Some(now),
            BatchStatus::Completed => batch.actual_end = Some(now),
            BatchStatus::Draft => {
                batch.actual_start = None;
                batch.actual_end = None;
            }
            _ => {}
        }

        batch.status = target;
        batch.updated_at = now;
        CuringBatchRepository::update_status(conn, &batch, previous_status, now)?;

        let message = format!(
            "批次{}: {} → {}, 更新{}个工单",
            batch.load_number,
            previous_status,
            target,
            updated.len()
        );
        Ok((
            BatchAdvance {
                batch,
                previous_status,
                work_order_updates: updated,
                message,
            },
            events,
        ))
    }

    // ==========================================
    // 移出成员
    // ==========================================

    /// 移出单个成员并恢复其入批前状态
    pub fn remove_member(&self, actor: &ActorContext, batch_id: &str, work_order_id: &str) -> WorkflowResult<MemberRemoval> {
        let now = chrono::Utc::now().naive_utc();

        let removal = self.uow.execute("remove_batch_member", |tx| {
            let batch = CuringBatchRepository::find_by_id(tx, batch_id)?
                .ok_or_else(|| WorkflowError::not_found("CuringBatch", batch_id))?;
            let (autoclave, _) = self.load_autoclave(tx, actor, &batch.autoclave_id)?;

            if matches!(
                batch.status,
                BatchStatus::Completed | BatchStatus::Released | BatchStatus::Cancelled
            ) {
                return Err(WorkflowError::Validation {
                    message: format!("批次{}状态为{},不允许移出成员", batch.load_number, batch.status),
                    current_status: Some(batch.status.as_str().to_string()),
                    requested: Some("REMOVE_MEMBER".to_string()),
                    legal_actions: Vec::new(),
                    offending_ids: vec![work_order_id.to_string()],
                });
            }

            let item = CuringBatchRepository::find_item(tx, batch_id, work_order_id)?.ok_or_else(|| {
                WorkflowError::rejected_members(
                    format!("工单{}不是批次{}的成员", work_order_id, batch.load_number),
                    vec![work_order_id.to_string()],
                )
            })?;
            let wo = WorkOrderRepository::find_by_id(tx, work_order_id)?
                .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;

            let mut warnings = Vec::new();
            let fan_out = FanOut::new(tx, &batch, &autoclave, actor, now);
            fan_out.close_open_span(work_order_id, "移出批次")?;
            let notes = format!("移出批次{}", batch.load_number);

            let restored_status = if wo.status == IN_AUTOCLAVE {
                fan_out.unassign(work_order_id, notes)?;
                WorkOrderRepository::update_status(
                    tx,
                    work_order_id,
                    wo.status,
                    item.previous_status,
                    &actor.actor(),
                    &format!("BATCH_REMOVE {}", batch.load_number),
                    now,
                )?;
                Some(item.previous_status)
            } else {
                // 已转出的工单不恢复,罐内区间保持关闭
                fan_out.note(work_order_id, notes)?;
                warnings.push(format!(
                    "工单{}当前状态{}已离开热压罐,仅解除批次关系",
                    work_order_id, wo.status
                ));
                None
            };

            CuringBatchRepository::delete_item(tx, batch_id, work_order_id)?;

            Ok(MemberRemoval {
                batch_id: batch_id.to_string(),
                work_order_id: work_order_id.to_string(),
                restored_status,
                warnings,
            })
        })?;

        info!(
            batch_id,
            work_order_id,
            restored = ?removal.restored_status,
            actor = %actor.user_id,
            "批次成员已移出"
        );
        if let Some(restored) = removal.restored_status {
            self.publisher.publish_all(vec![WorkflowEvent::WorkOrderStatusChanged {
                work_order_id: work_order_id.to_string(),
                from: IN_AUTOCLAVE,
                to: restored,
            }]);
        }
        Ok(removal)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 工单当前所属的活动批次
    pub fn find_by_work_order(&self, work_order_id: &str) -> WorkflowResult<Option<BatchDetail>> {
        self.uow.read(|conn| {
            let Some((batch, _)) = CuringBatchRepository::find_active_by_work_order(conn, work_order_id)? else {
                return Ok(None);
            };
            let items = CuringBatchRepository::find_items(conn, &batch.batch_id)?;
            Ok(Some(BatchDetail { batch, items }))
        })
    }

    pub fn get(&self, batch_id: &str) -> WorkflowResult<BatchDetail> {
        self.uow.read(|conn| {
            let batch = CuringBatchRepository::find_by_id(conn, batch_id)?
                .ok_or_else(|| WorkflowError::not_found("CuringBatch", batch_id))?;
            let items = CuringBatchRepository::find_items(conn, batch_id)?;
            Ok(BatchDetail { batch, items })
        })
    }

    /// 加载热压罐及其所属部门,并校验操作者对该部门的权限
    fn load_autoclave(
        &self,
        conn: &Connection,
        actor: &ActorContext,
        autoclave_id: &str,
    ) -> WorkflowResult<(Autoclave, Department)> {
        let autoclave = AutoclaveRepository::find_by_id(conn, autoclave_id)?
            .ok_or_else(|| WorkflowError::not_found("Autoclave", autoclave_id))?;
        let dept = DepartmentRepository::find_by_id(conn, &autoclave.department_id)?
            .ok_or_else(|| WorkflowError::not_found("Department", &autoclave.department_id))?;
        if !self.capability.can_operate(actor, &dept) {
            return Err(WorkflowError::Capability {
                actor: actor.user_id.clone(),
                department_id: dept.department_id,
            });
        }
        Ok((autoclave, dept))
    }
}

// ==========================================
// FanOut - 成员扇出
// ==========================================
// 先逐个校验全部成员,全部通过后再写入;
// 写入阶段的失败由外层事务回滚
struct FanOut<'a> {
    conn: &'a Connection,
    batch: &'a CuringBatch,
    autoclave: &'a Autoclave,
    actor: &'a ActorContext,
    now: NaiveDateTime,
    updated: Vec<String>,
    events: Vec<WorkflowEvent>,
}

impl<'a> FanOut<'a> {
    fn new(
        conn: &'a Connection,
        batch: &'a CuringBatch,
        autoclave: &'a Autoclave,
        actor: &'a ActorContext,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            conn,
            batch,
            autoclave,
            actor,
            now,
            updated: Vec::new(),
            events: Vec::new(),
        }
    }

    fn current_status(&self, work_order_id: &str) -> WorkflowResult<WorkOrderStatus> {
        let wo = WorkOrderRepository::find_by_id(self.conn, work_order_id)?
            .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;
        Ok(wo.status)
    }

    /// 成员在热压罐部门内的最后状态事件
    fn last_autoclave_event(&self, work_order_id: &str) -> WorkflowResult<Option<EventKind>> {
        let history =
            ProductionEventRepository::find_for_department(self.conn, work_order_id, &self.autoclave.department_id)?;
        replay_events(&history).map_err(|msg| {
            error!(work_order_id, batch_id = %self.batch.batch_id, %msg, "成员事件序列不一致");
            WorkflowError::Integrity(msg)
        })
    }

    fn abort_if_any(&self, target: &str, offenders: Vec<String>) -> WorkflowResult<()> {
        if offenders.is_empty() {
            return Ok(());
        }
        Err(WorkflowError::rejected_members(
            format!(
                "批次{}推进到{}中止, 以下成员状态不符合预期: {}",
                self.batch.load_number,
                target,
                offenders.join(", ")
            ),
            offenders,
        ))
    }

    fn set_status(&mut self, work_order_id: &str, from: WorkOrderStatus, to: WorkOrderStatus, reason: &str) -> WorkflowResult<()> {
        WorkOrderRepository::update_status(
            self.conn,
            work_order_id,
            from,
            to,
            &self.actor.actor(),
            &format!("{} {}", reason, self.batch.load_number),
            self.now,
        )?;
        self.updated.push(work_order_id.to_string());
        self.events.push(WorkflowEvent::WorkOrderStatusChanged {
            work_order_id: work_order_id.to_string(),
            from,
            to,
        });
        Ok(())
    }

    fn append_system(&self, work_order_id: &str, kind: EventKind, notes: String, duration: Option<i64>) -> WorkflowResult<()> {
        let mut event = NewProductionEvent::new(work_order_id, self.autoclave.department_id.as_str(), Actor::System, kind)
            .with_notes(Some(notes))
            .with_duration(duration)
            .with_batch(Some(self.batch.batch_id.clone()));
        event.event_ts = self.now;
        ProductionEventRepository::append(self.conn, &event)?;
        Ok(())
    }

    fn note(&self, work_order_id: &str, notes: String) -> WorkflowResult<()> {
        self.append_system(work_order_id, EventKind::Note, notes, None)
    }

    /// 出批并恢复入批前状态: 之后可在热压罐重新开始区间
    fn unassign(&self, work_order_id: &str, notes: String) -> WorkflowResult<()> {
        self.append_system(work_order_id, EventKind::Unassigned, notes, None)
    }

    /// 成员仍在罐内（最后事件 ENTRY/RESUME）时追加系统 EXIT
    fn close_open_span(&self, work_order_id: &str, notes: &str) -> WorkflowResult<bool> {
        if !matches!(
            self.last_autoclave_event(work_order_id)?,
            Some(EventKind::Entry) | Some(EventKind::Resume)
        ) {
            return Ok(false);
        }
        let history =
            ProductionEventRepository::find_for_department(self.conn, work_order_id, &self.autoclave.department_id)?;
        let spans: Vec<(EventKind, NaiveDateTime)> = history.iter().map(|e| (e.kind, e.event_ts)).collect();
        let duration = active_duration_minutes(&spans, self.now);
        self.append_system(
            work_order_id,
            EventKind::Exit,
            format!("{} {}", notes, self.batch.load_number),
            Some(duration),
        )?;
        Ok(true)
    }

    /// 仅校验: 全部成员处于指定状态
    fn expect_all(&self, items: &[BatchItem], expected: WorkOrderStatus) -> WorkflowResult<()> {
        let mut offenders = Vec::new();
        for item in items {
            if self.current_status(&item.work_order_id)? != expected {
                offenders.push(item.work_order_id.clone());
            }
        }
        self.abort_if_any(BatchStatus::Ready.as_str(), offenders)
    }

    /// IN_CURE: 尚未进罐的成员追加系统 ENTRY
    fn start_cure(&mut self, items: &[BatchItem]) -> WorkflowResult<()> {
        let mut to_enter = Vec::new();
        let mut offenders = Vec::new();
        for item in items {
            let status = self.current_status(&item.work_order_id)?;
            match (status, self.last_autoclave_event(&item.work_order_id)?) {
                (s, None) if s == IN_AUTOCLAVE => to_enter.push(item.work_order_id.as_str()),
                (s, Some(EventKind::Entry)) | (s, Some(EventKind::Resume)) if s == IN_AUTOCLAVE => {}
                _ => offenders.push(item.work_order_id.clone()),
            }
        }
        self.abort_if_any(BatchStatus::InCure.as_str(), offenders)?;

        for work_order_id in to_enter {
            self.append_system(work_order_id, EventKind::Entry, format!("批次{}开始固化", self.batch.load_number), None)?;
        }
        Ok(())
    }

    /// COMPLETED: 全部成员置为 AUTOCLAVE_COMPLETED,仍在罐内的追加系统 EXIT
    fn finish_cure(&mut self, items: &[BatchItem]) -> WorkflowResult<()> {
        let mut to_complete = Vec::new();
        let mut offenders = Vec::new();
        for item in items {
            let status = self.current_status(&item.work_order_id)?;
            let last = self.last_autoclave_event(&item.work_order_id)?;
            match (status, last) {
                (s, Some(EventKind::Entry)) | (s, Some(EventKind::Resume)) if s == IN_AUTOCLAVE => {
                    to_complete.push((item.work_order_id.clone(), status))
                }
                // 已通过闸门单件 EXIT
                (s, Some(EventKind::Exit)) if s == AUTOCLAVE_COMPLETED => {}
                _ => offenders.push(item.work_order_id.clone()),
            }
        }
        self.abort_if_any(BatchStatus::Completed.as_str(), offenders)?;

        for (work_order_id, status) in to_complete {
            self.close_open_span(&work_order_id, "批次固化完成")?;
            self.set_status(&work_order_id, status, AUTOCLAVE_COMPLETED, "BATCH_COMPLETE")?;
        }
        Ok(())
    }

    /// RELEASED: 全部成员进入释放目标部门
    fn release(&mut self, items: &[BatchItem], target: WorkOrderStatus) -> WorkflowResult<()> {
        let mut offenders = Vec::new();
        for item in items {
            if self.current_status(&item.work_order_id)? != AUTOCLAVE_COMPLETED {
                offenders.push(item.work_order_id.clone());
            }
        }
        self.abort_if_any(BatchStatus::Released.as_str(), offenders)?;

        for item in items {
            self.set_status(&item.work_order_id, AUTOCLAVE_COMPLETED, target, "BATCH_RELEASE")?;
        }
        Ok(())
    }

    /// CANCELLED: 恢复入批前状态; 已进罐的成员追加系统 EXIT
    fn cancel(&mut self, items: &[BatchItem]) -> WorkflowResult<()> {
        let mut offenders = Vec::new();
        for item in items {
            let status = self.current_status(&item.work_order_id)?;
            let last = self.last_autoclave_event(&item.work_order_id)?;
            let paused = last == Some(EventKind::Pause);
            if status != IN_AUTOCLAVE || paused {
                offenders.push(item.work_order_id.clone());
            }
        }
        self.abort_if_any(BatchStatus::Cancelled.as_str(), offenders)?;

        for item in items {
            self.close_open_span(&item.work_order_id, "批次取消")?;
            self.unassign(&item.work_order_id, format!("批次{}取消", self.batch.load_number))?;
            self.set_status(&item.work_order_id, IN_AUTOCLAVE, item.previous_status, "BATCH_CANCEL")?;
        }
        Ok(())
    }

    /// CANCELLED → DRAFT: 重新检查成员并再次置为 IN_AUTOCLAVE
    fn redraft(&mut self, items: &[BatchItem], settings: &WorkflowSettings) -> WorkflowResult<()> {
        // 取消期间时间窗可能已被新批次占用
        let overlapping = CuringBatchRepository::find_overlapping_active(
            self.conn,
            &self.autoclave.autoclave_id,
            &self.batch.planned_window,
            Some(&self.batch.batch_id),
        )?;
        if !overlapping.is_empty() {
            let loads: Vec<String> = overlapping.into_iter().map(|b| b.load_number).collect();
            return Err(WorkflowError::rejected_members(
                format!("热压罐{}在计划时间窗内已被占用: {}", self.autoclave.code, loads.join(", ")),
                loads,
            ));
        }

        let ids: Vec<String> = items.iter().map(|i| i.work_order_id.clone()).collect();
        let work_orders = WorkOrderRepository::find_many(self.conn, &ids)?;

        let mut offenders = Vec::new();
        for wo in &work_orders {
            if CuringBatchRepository::find_active_by_work_order(self.conn, &wo.work_order_id)?.is_some() {
                offenders.push(wo.work_order_id.clone());
            }
        }
        self.abort_if_any(BatchStatus::Draft.as_str(), offenders)?;

        let report = compatibility::check(
            &work_orders,
            &self.batch.recipe_id,
            &self.autoclave.envelope,
            settings.pre_batch_status,
            settings.capacity_warning_pct,
        )
        .map_err(|rejection| WorkflowError::rejected_members(rejection.to_string(), rejection.offending_ids()))?;

        let summary = format!(
            "重新起草装载{}: {}件, 利用率{:.1}%",
            self.batch.load_number,
            work_orders.len(),
            report.utilization_pct
        );
        for wo in &work_orders {
            let item = BatchItem {
                batch_id: self.batch.batch_id.clone(),
                work_order_id: wo.work_order_id.clone(),
                previous_status: wo.status,
                added_at: self.now,
            };
            CuringBatchRepository::update_item_previous_status(self.conn, &item)?;
            BatchManager::assign_member(
                self.conn,
                self.batch,
                self.autoclave,
                &wo.work_order_id,
                wo.status,
                self.actor,
                &summary,
                self.now,
            )?;
            self.updated.push(wo.work_order_id.clone());
            self.events.push(WorkflowEvent::WorkOrderStatusChanged {
                work_order_id: wo.work_order_id.clone(),
                from: wo.status,
                to: IN_AUTOCLAVE,
            });
        }
        Ok(())
    }
}
