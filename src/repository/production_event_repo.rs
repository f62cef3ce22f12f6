// ==========================================
// 生产执行系统 - 生产事件数据仓储
// ==========================================
// 对齐: production_event 表
// 红线: 只追加; 不提供 UPDATE/DELETE
// 次序: event_id 自增,在串行化写事务下即提交顺序
// ==========================================

use crate::domain::production_event::{NewProductionEvent, ProductionEvent};
use crate::domain::types::{Actor, EventKind};
use crate::repository::error::RepositoryResult;
use crate::repository::{conversion_error, format_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    event_id, work_order_id, department_id, actor_id, kind,
    event_ts, duration_minutes, notes, batch_id
"#;

// ==========================================
// ProductionEventRepository - 生产事件仓储
// ==========================================
pub struct ProductionEventRepository;

impl ProductionEventRepository {
    /// 追加事件
    ///
    /// # 返回
    /// 带 event_id 的已持久化事件
    pub fn append(conn: &Connection, event: &NewProductionEvent) -> RepositoryResult<ProductionEvent> {
        conn.execute(
            r#"INSERT INTO production_event (
                work_order_id, department_id, actor_id, is_automatic, kind,
                event_ts, duration_minutes, notes, batch_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                event.work_order_id,
                event.department_id,
                event.actor.user_id(),
                event.actor.is_automatic(),
                event.kind.as_str(),
                format_ts(&event.event_ts),
                event.duration_minutes,
                event.notes,
                event.batch_id,
            ],
        )?;

        Ok(ProductionEvent {
            event_id: conn.last_insert_rowid(),
            work_order_id: event.work_order_id.clone(),
            department_id: event.department_id.clone(),
            actor: event.actor.clone(),
            kind: event.kind,
            event_ts: event.event_ts,
            duration_minutes: event.duration_minutes,
            notes: event.notes.clone(),
            batch_id: event.batch_id.clone(),
        })
    }

    /// 工单在指定部门的完整事件序列（按提交顺序）
    pub fn find_for_department(
        conn: &Connection,
        work_order_id: &str,
        department_id: &str,
    ) -> RepositoryResult<Vec<ProductionEvent>> {
        let sql = format!(
            "SELECT {} FROM production_event WHERE work_order_id = ?1 AND department_id = ?2 ORDER BY event_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![work_order_id, department_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// 工单全部事件（时间线）
    pub fn find_by_work_order(conn: &Connection, work_order_id: &str) -> RepositoryResult<Vec<ProductionEvent>> {
        let sql = format!(
            "SELECT {} FROM production_event WHERE work_order_id = ?1 ORDER BY event_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![work_order_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// 工单在指定部门的最后一条事件（任意类型）
    pub fn find_last(
        conn: &Connection,
        work_order_id: &str,
        department_id: &str,
    ) -> RepositoryResult<Option<ProductionEvent>> {
        let sql = format!(
            "SELECT {} FROM production_event WHERE work_order_id = ?1 AND department_id = ?2 ORDER BY event_id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let event = conn
            .query_row(&sql, params![work_order_id, department_id], Self::map_row)
            .optional()?;
        Ok(event)
    }

    /// 指定类型的事件数量（审计/测试用）
    pub fn count_by_kind(
        conn: &Connection,
        work_order_id: &str,
        department_id: &str,
        kind: EventKind,
    ) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM production_event WHERE work_order_id = ?1 AND department_id = ?2 AND kind = ?3",
            params![work_order_id, department_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductionEvent> {
        let kind_raw: String = row.get(4)?;
        let ts_raw: String = row.get(5)?;

        Ok(ProductionEvent {
            event_id: row.get(0)?,
            work_order_id: row.get(1)?,
            department_id: row.get(2)?,
            actor: Actor::from_db(row.get(3)?),
            kind: EventKind::parse(&kind_raw)
                .ok_or_else(|| conversion_error(4, format!("未知事件类型: {}", kind_raw)))?,
            event_ts: parse_ts(5, &ts_raw)?,
            duration_minutes: row.get(6)?,
            notes: row.get(7)?,
            batch_id: row.get(8)?,
        })
    }
}
