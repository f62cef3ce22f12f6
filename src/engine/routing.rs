// ==========================================
// 生产执行系统 - 自动转序
// ==========================================
// 职责: EXIT 后按路由表把工单推进到下一部门
// 查找顺序: 产品类型专用规则 → 默认规则
// 说明: 下一部门为闸控部门（热压罐）时不改状态,
//       工单停留在“本部门已完成”,等待批次装载
// ==========================================

use crate::domain::types::{Actor, DepartmentType, WorkOrderStatus};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::repository::{DepartmentRepository, RoutingRepository, WorkOrderRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ==========================================
// RouteOutcome - 转序结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub success: bool,
    pub next_department: Option<DepartmentType>,
    pub next_department_id: Option<String>,
    /// 实际写入的新状态; 闸控等待或失败时为 None
    pub new_status: Option<WorkOrderStatus>,
    pub message: Option<String>,
}

impl RouteOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            next_department: None,
            next_department_id: None,
            new_status: None,
            message: Some(message),
        }
    }
}

pub struct AutoRouter;

impl AutoRouter {
    /// 在调用方事务内执行转序
    ///
    /// # 返回
    /// - `Ok(RouteOutcome { success: false, .. })`: 路由不可用,调用方转为告警
    /// - `Err`: 数据访问失败
    pub fn route(
        conn: &Connection,
        work_order_id: &str,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> WorkflowResult<RouteOutcome> {
        let wo = WorkOrderRepository::find_by_id(conn, work_order_id)?
            .ok_or_else(|| WorkflowError::not_found("WorkOrder", work_order_id))?;

        let WorkOrderStatus::DepartmentCompleted(from) = wo.status else {
            return Ok(RouteOutcome::failed(format!(
                "工单状态{}不是部门完成态,不执行转序",
                wo.status
            )));
        };

        let Some(next) = RoutingRepository::find_next(conn, wo.product_type.as_deref(), from)? else {
            debug!(work_order_id, from = %from, "路由终点,等待显式完工");
            return Ok(RouteOutcome {
                success: true,
                next_department: None,
                next_department_id: None,
                new_status: None,
                message: Some(format!("{}为路由终点", from)),
            });
        };

        let Some(dept) = DepartmentRepository::find_active_by_type(conn, next)? else {
            return Ok(RouteOutcome::failed(format!("下一部门类型{}没有启用的部门", next)));
        };

        if next.is_batch_gated() {
            debug!(work_order_id, next = %next, "下一部门为闸控部门,等待批次装载");
            return Ok(RouteOutcome {
                success: true,
                next_department: Some(next),
                next_department_id: Some(dept.department_id),
                new_status: None,
                message: Some(format!("等待{}批次装载", next)),
            });
        }

        let target = WorkOrderStatus::InDepartment(next);
        WorkOrderRepository::update_status(conn, work_order_id, wo.status, target, actor, "AUTO_ROUTE", now)?;
        info!(work_order_id, from = %wo.status, to = %target, "自动转序完成");

        Ok(RouteOutcome {
            success: true,
            next_department: Some(next),
            next_department_id: Some(dept.department_id),
            new_status: Some(target),
            message: None,
        })
    }
}
