// ==========================================
// 生产执行系统 - 工单数据仓储
// ==========================================
// 对齐: work_order / work_order_status_log 表
// 红线: 状态变更采用比较并交换(CAS), 同一事务内写审计行
// ==========================================

use crate::domain::production_event::StatusChange;
use crate::domain::types::{Actor, Priority, WorkOrderStatus};
use crate::domain::work_order::{Dimensions, WorkOrder};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{conversion_error, format_ts, parse_date, parse_ts};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    work_order_id, product_code, product_type, quantity, priority,
    status, hold_previous_status, length_mm, width_mm, height_mm,
    cure_recipe_id, due_date, created_at, updated_at
"#;

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository;

impl WorkOrderRepository {
    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新工单
    pub fn insert(conn: &Connection, wo: &WorkOrder) -> RepositoryResult<()> {
        let (length, width, height) = match wo.dimensions {
            Some(d) => (Some(d.length_mm), Some(d.width_mm), Some(d.height_mm)),
            None => (None, None, None),
        };

        conn.execute(
            r#"INSERT INTO work_order (
                work_order_id, product_code, product_type, quantity, priority,
                status, hold_previous_status, length_mm, width_mm, height_mm,
                cure_recipe_id, due_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                wo.work_order_id,
                wo.product_code,
                wo.product_type,
                wo.quantity,
                wo.priority.as_str(),
                wo.status.to_db_string(),
                wo.hold_previous_status.map(|s| s.to_db_string()),
                length,
                width,
                height,
                wo.cure_recipe_id,
                wo.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                format_ts(&wo.created_at),
                format_ts(&wo.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 状态变更（比较并交换）
    ///
    /// # 参数
    /// - `expected`: 调用方读到的当前状态
    /// - `target`: 目标状态
    ///
    /// # 返回
    /// - `Err(Conflict)`: 当前状态已不是 `expected`（被并发修改）
    pub fn update_status(
        conn: &Connection,
        work_order_id: &str,
        expected: WorkOrderStatus,
        target: WorkOrderStatus,
        actor: &Actor,
        reason: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE work_order SET status = ?1, updated_at = ?2 WHERE work_order_id = ?3 AND status = ?4",
            params![
                target.to_db_string(),
                format_ts(&now),
                work_order_id,
                expected.to_db_string()
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::Conflict(format!(
                "工单{}状态已不是{}",
                work_order_id, expected
            )));
        }

        conn.execute(
            r#"INSERT INTO work_order_status_log
               (work_order_id, from_status, to_status, actor_id, reason, changed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                work_order_id,
                expected.to_db_string(),
                target.to_db_string(),
                actor.user_id(),
                reason,
                format_ts(&now),
            ],
        )?;
        Ok(())
    }

    /// 设置/清除 ON_HOLD 前状态
    pub fn set_hold_previous_status(
        conn: &Connection,
        work_order_id: &str,
        previous: Option<WorkOrderStatus>,
    ) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE work_order SET hold_previous_status = ?1 WHERE work_order_id = ?2",
            params![previous.map(|s| s.to_db_string()), work_order_id],
        )?;
        Ok(())
    }

    /// 刷新最后修改时间
    pub fn touch(conn: &Connection, work_order_id: &str, now: NaiveDateTime) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE work_order SET updated_at = ?1 WHERE work_order_id = ?2",
            params![format_ts(&now), work_order_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("WorkOrder", work_order_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(conn: &Connection, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let sql = format!("SELECT {} FROM work_order WHERE work_order_id = ?1", SELECT_COLUMNS);
        let wo = conn
            .query_row(&sql, params![work_order_id], Self::map_row)
            .optional()?;
        Ok(wo)
    }

    /// 按输入顺序批量查询; 缺失的工单返回 NotFound
    pub fn find_many(conn: &Connection, work_order_ids: &[String]) -> RepositoryResult<Vec<WorkOrder>> {
        let mut result = Vec::with_capacity(work_order_ids.len());
        for id in work_order_ids {
            let wo = Self::find_by_id(conn, id)?
                .ok_or_else(|| RepositoryError::not_found("WorkOrder", id))?;
            result.push(wo);
        }
        Ok(result)
    }

    /// 状态变更历史（按发生顺序）
    pub fn status_history(conn: &Connection, work_order_id: &str) -> RepositoryResult<Vec<StatusChange>> {
        let mut stmt = conn.prepare(
            r#"SELECT work_order_id, from_status, to_status, actor_id, reason, changed_at
               FROM work_order_status_log
               WHERE work_order_id = ?1
               ORDER BY log_id"#,
        )?;

        let rows = stmt
            .query_map(params![work_order_id], |row| {
                let from_raw: String = row.get(1)?;
                let to_raw: String = row.get(2)?;
                let changed_raw: String = row.get(5)?;
                Ok(StatusChange {
                    work_order_id: row.get(0)?,
                    from_status: parse_status(1, &from_raw)?,
                    to_status: parse_status(2, &to_raw)?,
                    actor: Actor::from_db(row.get(3)?),
                    reason: row.get(4)?,
                    changed_at: parse_ts(5, &changed_raw)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<WorkOrder> {
        let priority_raw: String = row.get(4)?;
        let status_raw: String = row.get(5)?;
        let hold_raw: Option<String> = row.get(6)?;
        let length: Option<f64> = row.get(7)?;
        let width: Option<f64> = row.get(8)?;
        let height: Option<f64> = row.get(9)?;
        let due_raw: Option<String> = row.get(11)?;
        let created_raw: String = row.get(12)?;
        let updated_raw: String = row.get(13)?;

        let dimensions = match (length, width, height) {
            (Some(l), Some(w), Some(h)) => Some(Dimensions::new(l, w, h)),
            _ => None,
        };

        Ok(WorkOrder {
            work_order_id: row.get(0)?,
            product_code: row.get(1)?,
            product_type: row.get(2)?,
            quantity: row.get(3)?,
            priority: Priority::parse(&priority_raw)
                .ok_or_else(|| conversion_error(4, format!("未知优先级: {}", priority_raw)))?,
            status: parse_status(5, &status_raw)?,
            hold_previous_status: hold_raw.map(|s| parse_status(6, &s)).transpose()?,
            dimensions,
            cure_recipe_id: row.get(10)?,
            due_date: due_raw.map(|s| parse_date(11, &s)).transpose()?,
            created_at: parse_ts(12, &created_raw)?,
            updated_at: parse_ts(13, &updated_raw)?,
        })
    }
}

pub(crate) fn parse_status(idx: usize, raw: &str) -> rusqlite::Result<WorkOrderStatus> {
    WorkOrderStatus::parse(raw).ok_or_else(|| conversion_error(idx, format!("未知工单状态: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DepartmentType;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_find_by_id() {
        let conn = setup();
        let mut wo = WorkOrder::new("ODL-001", "P-100", 4);
        wo.dimensions = Some(Dimensions::new(1000.0, 500.0, 200.0));
        wo.priority = Priority::High;
        WorkOrderRepository::insert(&conn, &wo).unwrap();

        let found = WorkOrderRepository::find_by_id(&conn, "ODL-001").unwrap().unwrap();
        assert_eq!(found.product_code, "P-100");
        assert_eq!(found.priority, Priority::High);
        assert_eq!(found.status, WorkOrderStatus::Created);
        assert_eq!(found.dimensions, wo.dimensions);

        assert!(WorkOrderRepository::find_by_id(&conn, "ODL-404").unwrap().is_none());
    }

    #[test]
    fn test_update_status_is_compare_and_set() {
        let conn = setup();
        WorkOrderRepository::insert(&conn, &WorkOrder::new("ODL-002", "P-100", 1)).unwrap();
        let now = chrono::Utc::now().naive_utc();
        let target = WorkOrderStatus::InDepartment(DepartmentType::Cleanroom);

        WorkOrderRepository::update_status(
            &conn,
            "ODL-002",
            WorkOrderStatus::Created,
            target,
            &Actor::human("op1"),
            "ENTRY",
            now,
        )
        .unwrap();

        // 期望状态已过期 → Conflict
        let stale = WorkOrderRepository::update_status(
            &conn,
            "ODL-002",
            WorkOrderStatus::Created,
            WorkOrderStatus::Cancelled,
            &Actor::System,
            "stale",
            now,
        );
        assert!(matches!(stale, Err(RepositoryError::Conflict(_))));

        let history = WorkOrderRepository::status_history(&conn, "ODL-002").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, target);
        assert_eq!(history[0].actor, Actor::human("op1"));
    }
}
