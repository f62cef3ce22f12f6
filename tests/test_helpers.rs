// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、工单/操作者构造、应用状态装配
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use mes_workflow::app::AppState;
use mes_workflow::db::{default_department_id, ensure_schema, open_sqlite_connection, seed_defaults};
use mes_workflow::domain::production_event::NewProductionEvent;
use mes_workflow::domain::types::{Actor, DepartmentType, EventKind, Priority, WorkOrderStatus};
use mes_workflow::domain::work_order::{Dimensions, WorkOrder};
use mes_workflow::engine::{ActorContext, RoleBasedCapability, WorkflowEventPublisher};
use mes_workflow::repository::{ProductionEventRepository, WorkOrderRepository};
use rusqlite::Connection;
use tempfile::NamedTempFile;

/// 默认种子数据中的热压罐与工艺
pub const AUTOCLAVE_ID: &str = "AC-01";
pub const RECIPE_ID: &str = "RCP-180";

/// 创建临时测试数据库并初始化 schema 与默认目录
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;
    seed_defaults(&conn)?;

    Ok((temp_file, db_path))
}

/// 基于临时数据库装配完整应用状态
pub fn setup_state() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    (temp_file, state)
}

/// 装配带事件发布器的应用状态（使用独立连接）
pub fn setup_state_with_publisher(publisher: Arc<dyn WorkflowEventPublisher>) -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = open_sqlite_connection(&db_path).unwrap();
    let state = AppState::from_connection(
        Arc::new(Mutex::new(conn)),
        Arc::new(RoleBasedCapability),
        Some(publisher),
    );
    (temp_file, state)
}

/// 默认部门ID
pub fn dept(t: DepartmentType) -> String {
    default_department_id(t)
}

pub fn supervisor() -> ActorContext {
    ActorContext::supervisor("sup-01")
}

pub fn operator_of(t: DepartmentType) -> ActorContext {
    ActorContext::operator(format!("op-{}", t.as_str().to_lowercase()), dept(t))
}

/// 构造测试工单（默认工艺 RCP-180, 1m × 0.5m × 0.2m）
pub fn work_order(work_order_id: &str, status: WorkOrderStatus) -> WorkOrder {
    let mut wo = WorkOrder::new(work_order_id, format!("PN-{}", work_order_id), 1);
    wo.status = status;
    wo.priority = Priority::Normal;
    wo.dimensions = Some(Dimensions::new(1000.0, 500.0, 200.0));
    wo.cure_recipe_id = Some(RECIPE_ID.to_string());
    wo
}

/// 直接写入工单（绕过引擎,用于准备前置状态）
pub fn insert_work_order(state: &AppState, wo: &WorkOrder) {
    state
        .unit_of_work
        .read(|conn| WorkOrderRepository::insert(conn, wo))
        .unwrap();
}

/// 写入处于净化间完成态（入批前状态）的工单
pub fn insert_ready_for_autoclave(state: &AppState, ids: &[&str]) {
    for id in ids {
        insert_work_order(
            state,
            &work_order(id, WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom)),
        );
    }
}

/// 绕过校验直接追加事件（用于构造损坏的历史）
pub fn append_raw_event(state: &AppState, work_order_id: &str, t: DepartmentType, kind: EventKind) {
    let event = NewProductionEvent::new(work_order_id, dept(t), Actor::human("legacy-import"), kind);
    state
        .unit_of_work
        .read(|conn| ProductionEventRepository::append(conn, &event))
        .unwrap();
}

pub fn current_status(state: &AppState, work_order_id: &str) -> WorkOrderStatus {
    state
        .unit_of_work
        .read(|conn| WorkOrderRepository::find_by_id(conn, work_order_id))
        .unwrap()
        .unwrap()
        .status
}

pub fn count_events(state: &AppState, work_order_id: &str, t: DepartmentType, kind: EventKind) -> i64 {
    state
        .unit_of_work
        .read(|conn| ProductionEventRepository::count_by_kind(conn, work_order_id, &dept(t), kind))
        .unwrap()
}

/// 原始 SQL 计数
pub fn count_rows(state: &AppState, sql: &str) -> i64 {
    let conn = state.unit_of_work.connection();
    let guard = conn.lock().unwrap();
    count_rows_on(&guard, sql)
}

pub fn count_rows_on(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
