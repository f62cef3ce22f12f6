// ==========================================
// 生产执行系统 - 工单动作 API
// ==========================================
// 职责: 部门动作执行、合法动作查询、工单时间线、显式状态转换
// 说明: 会话缺失 → Unauthorized; 其余错误由 WorkflowError 转换
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::production_event::{ActionMetadata, ProductionEvent, StatusChange};
use crate::domain::types::EventKind;
use crate::engine::capability::ActorContext;
use crate::engine::routing::RouteOutcome;
use crate::engine::workflow::{ActionRequest, StatusOverride, WorkOrderTimeline, WorkflowEngine};

// ==========================================
// 请求 DTO
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadataDto {
    /// 分钟
    pub duration: Option<i64>,
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformActionRequest {
    pub work_order_id: String,
    pub department_id: String,
    pub action_kind: EventKind,
    pub notes: Option<String>,
    #[serde(default)]
    pub force_transfer: bool,
    pub metadata: Option<ActionMetadataDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOverrideRequest {
    pub work_order_id: String,
    pub operation: StatusOverride,
    pub reason: Option<String>,
}

// ==========================================
// 响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: i64,
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    pub is_automatic: bool,
}

impl From<&ProductionEvent> for EventSummary {
    fn from(event: &ProductionEvent) -> Self {
        Self {
            id: event.event_id,
            kind: event.kind,
            timestamp: event.event_ts,
            is_automatic: event.is_automatic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTransferDto {
    pub success: bool,
    pub next_department: Option<String>,
    pub new_status: Option<String>,
    pub message: Option<String>,
}

impl From<RouteOutcome> for AutoTransferDto {
    fn from(outcome: RouteOutcome) -> Self {
        Self {
            success: outcome.success,
            next_department: outcome.next_department_id,
            new_status: outcome.new_status.map(|s| s.to_db_string()),
            message: outcome.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformActionResponse {
    pub success: bool,
    pub event: EventSummary,
    pub current_status: String,
    pub auto_transfer: Option<AutoTransferDto>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableActionsResponse {
    pub current_status: String,
    pub last_event: Option<EventSummary>,
    pub available_actions: Vec<EventKind>,
}

// ==========================================
// ProductionApi
// ==========================================
pub struct ProductionApi {
    engine: Arc<WorkflowEngine>,
}

impl ProductionApi {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    /// 执行部门动作
    ///
    /// # 错误
    /// - Unauthorized: 无会话
    /// - Forbidden / NotFound / ValidationError / Conflict / IntegrityError
    pub fn perform_work_order_action(
        &self,
        session: Option<&ActorContext>,
        request: PerformActionRequest,
    ) -> ApiResult<PerformActionResponse> {
        let actor = session.ok_or(ApiError::Unauthorized)?;
        require_id("workOrderId", &request.work_order_id)?;
        require_id("departmentId", &request.department_id)?;
        if let Some(d) = request.metadata.as_ref().and_then(|m| m.duration) {
            if d < 0 {
                return Err(ApiError::InvalidInput(format!("duration不能为负数: {}", d)));
            }
        }

        let metadata = request
            .metadata
            .map(|m| ActionMetadata {
                duration_minutes: m.duration,
                batch_id: m.batch_id,
            })
            .unwrap_or_default();
        let action = ActionRequest {
            work_order_id: request.work_order_id.trim().to_string(),
            department_id: request.department_id.trim().to_string(),
            action: request.action_kind,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            metadata,
            force_transfer: request.force_transfer,
        };

        let outcome = self.engine.perform_action(actor, &action)?;
        Ok(PerformActionResponse {
            success: true,
            event: EventSummary::from(&outcome.event),
            current_status: outcome.status_after.to_db_string(),
            auto_transfer: outcome.auto_transfer.map(AutoTransferDto::from),
            warnings: outcome.warnings,
        })
    }

    /// 合法动作查询（只读）
    pub fn available_actions(&self, work_order_id: &str, department_id: &str) -> ApiResult<AvailableActionsResponse> {
        require_id("workOrderId", work_order_id)?;
        require_id("departmentId", department_id)?;

        let actions = self.engine.available_actions(work_order_id.trim(), department_id.trim())?;
        debug!(
            work_order_id,
            department_id,
            status = %actions.current_status,
            count = actions.available_actions.len(),
            "合法动作查询"
        );
        Ok(AvailableActionsResponse {
            current_status: actions.current_status.to_db_string(),
            last_event: actions.last_event.as_ref().map(EventSummary::from),
            available_actions: actions.available_actions,
        })
    }

    pub fn work_order_timeline(&self, work_order_id: &str) -> ApiResult<WorkOrderTimeline> {
        require_id("workOrderId", work_order_id)?;
        Ok(self.engine.timeline(work_order_id.trim())?)
    }

    /// 完工 / 挂起 / 解除挂起 / 取消
    pub fn override_work_order_status(
        &self,
        session: Option<&ActorContext>,
        request: StatusOverrideRequest,
    ) -> ApiResult<StatusChange> {
        let actor = session.ok_or(ApiError::Unauthorized)?;
        require_id("workOrderId", &request.work_order_id)?;
        Ok(self.engine.override_status(
            actor,
            request.work_order_id.trim(),
            request.operation,
            request.reason.as_deref(),
        )?)
    }
}

pub(crate) fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}
