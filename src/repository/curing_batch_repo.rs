// ==========================================
// 生产执行系统 - 固化批次数据仓储
// ==========================================
// 对齐: curing_batch / batch_item 表
// 说明: 已释放/已取消批次的成员行保留用于审计;
//       “同一工单至多一个活动批次”由应用层保证
// ==========================================

use crate::domain::curing_batch::{BatchItem, CuringBatch, PlannedWindow};
use crate::domain::types::BatchStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::work_order_repo::parse_status;
use crate::repository::{conversion_error, format_ts, parse_ts};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

const BATCH_COLUMNS: &str = r#"
    b.batch_id, b.load_number, b.status, b.autoclave_id, b.recipe_id,
    b.planned_start, b.planned_end, b.actual_start, b.actual_end,
    b.created_by, b.created_at, b.updated_at
"#;

/// 活动批次状态（SQL 片段）
const ACTIVE_STATUSES_SQL: &str = "('DRAFT', 'READY', 'IN_CURE', 'COMPLETED')";

// ==========================================
// CuringBatchRepository - 固化批次仓储
// ==========================================
pub struct CuringBatchRepository;

impl CuringBatchRepository {
    // ==========================================
    // 批次
    // ==========================================

    pub fn insert(conn: &Connection, batch: &CuringBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO curing_batch (
                batch_id, load_number, status, autoclave_id, recipe_id,
                planned_start, planned_end, actual_start, actual_end,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                batch.batch_id,
                batch.load_number,
                batch.status.as_str(),
                batch.autoclave_id,
                batch.recipe_id,
                format_ts(&batch.planned_window.start),
                format_ts(&batch.planned_window.end),
                batch.actual_start.as_ref().map(format_ts),
                batch.actual_end.as_ref().map(format_ts),
                batch.created_by,
                format_ts(&batch.created_at),
                format_ts(&batch.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, batch_id: &str) -> RepositoryResult<Option<CuringBatch>> {
        let sql = format!("SELECT {} FROM curing_batch b WHERE b.batch_id = ?1", BATCH_COLUMNS);
        let batch = conn.query_row(&sql, params![batch_id], Self::map_batch).optional()?;
        Ok(batch)
    }

    /// 批次状态变更（比较并交换）,同时写入实际开始/结束时间
    pub fn update_status(
        conn: &Connection,
        batch: &CuringBatch,
        expected: BatchStatus,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE curing_batch
               SET status = ?1, actual_start = ?2, actual_end = ?3, updated_at = ?4
               WHERE batch_id = ?5 AND status = ?6"#,
            params![
                batch.status.as_str(),
                batch.actual_start.as_ref().map(format_ts),
                batch.actual_end.as_ref().map(format_ts),
                format_ts(&now),
                batch.batch_id,
                expected.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::Conflict(format!(
                "批次{}状态已不是{}",
                batch.batch_id, expected
            )));
        }
        Ok(())
    }

    /// 同一热压罐在时间窗内的活动批次（排除指定批次）
    pub fn find_overlapping_active(
        conn: &Connection,
        autoclave_id: &str,
        window: &PlannedWindow,
        exclude_batch_id: Option<&str>,
    ) -> RepositoryResult<Vec<CuringBatch>> {
        let sql = format!(
            r#"SELECT {} FROM curing_batch b
               WHERE b.autoclave_id = ?1
                 AND b.status IN {}
                 AND b.planned_start < ?3
                 AND ?2 < b.planned_end
                 AND b.batch_id <> IFNULL(?4, '')
               ORDER BY b.planned_start"#,
            BATCH_COLUMNS, ACTIVE_STATUSES_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(
                params![
                    autoclave_id,
                    format_ts(&window.start),
                    format_ts(&window.end),
                    exclude_batch_id
                ],
                Self::map_batch,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    /// 生成装载号: `<热压罐编码>-<YYYYMMDD>-<三位序号>`
    pub fn next_load_number(
        conn: &Connection,
        autoclave_code: &str,
        day: NaiveDate,
    ) -> RepositoryResult<String> {
        let prefix = format!("{}-{}-", autoclave_code, day.format("%Y%m%d"));
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM curing_batch WHERE load_number LIKE ?1 || '%'",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(format!("{}{:03}", prefix, count + 1))
    }

    // ==========================================
    // 批次成员
    // ==========================================

    pub fn insert_item(conn: &Connection, item: &BatchItem) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO batch_item (batch_id, work_order_id, previous_status, added_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                item.batch_id,
                item.work_order_id,
                item.previous_status.to_db_string(),
                format_ts(&item.added_at),
            ],
        )?;
        Ok(())
    }

    /// 覆盖成员的入批前状态（重新起草时使用）
    pub fn update_item_previous_status(conn: &Connection, item: &BatchItem) -> RepositoryResult<()> {
        conn.execute(
            r#"UPDATE batch_item SET previous_status = ?1, added_at = ?2
               WHERE batch_id = ?3 AND work_order_id = ?4"#,
            params![
                item.previous_status.to_db_string(),
                format_ts(&item.added_at),
                item.batch_id,
                item.work_order_id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_item(conn: &Connection, batch_id: &str, work_order_id: &str) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "DELETE FROM batch_item WHERE batch_id = ?1 AND work_order_id = ?2",
            params![batch_id, work_order_id],
        )?;
        Ok(rows)
    }

    pub fn find_items(conn: &Connection, batch_id: &str) -> RepositoryResult<Vec<BatchItem>> {
        let mut stmt = conn.prepare(
            r#"SELECT batch_id, work_order_id, previous_status, added_at
               FROM batch_item WHERE batch_id = ?1
               ORDER BY rowid"#,
        )?;
        let items = stmt
            .query_map(params![batch_id], Self::map_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn find_item(
        conn: &Connection,
        batch_id: &str,
        work_order_id: &str,
    ) -> RepositoryResult<Option<BatchItem>> {
        let item = conn
            .query_row(
                r#"SELECT batch_id, work_order_id, previous_status, added_at
                   FROM batch_item WHERE batch_id = ?1 AND work_order_id = ?2"#,
                params![batch_id, work_order_id],
                Self::map_item,
            )
            .optional()?;
        Ok(item)
    }

    /// 工单当前所属的活动批次
    ///
    /// 同一工单出现多个活动批次属于数据不一致,以 BusinessRuleViolation 上报
    pub fn find_active_by_work_order(
        conn: &Connection,
        work_order_id: &str,
    ) -> RepositoryResult<Option<(CuringBatch, BatchItem)>> {
        let sql = format!(
            r#"SELECT {}, i.batch_id, i.work_order_id, i.previous_status, i.added_at
               FROM batch_item i
               JOIN curing_batch b ON b.batch_id = i.batch_id
               WHERE i.work_order_id = ?1 AND b.status IN {}"#,
            BATCH_COLUMNS, ACTIVE_STATUSES_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params![work_order_id], |row| {
                let batch = Self::map_batch(row)?;
                let previous_raw: String = row.get(14)?;
                let added_raw: String = row.get(15)?;
                let item = BatchItem {
                    batch_id: row.get(12)?,
                    work_order_id: row.get(13)?,
                    previous_status: parse_status(14, &previous_raw)?,
                    added_at: parse_ts(15, &added_raw)?,
                };
                Ok((batch, item))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(RepositoryError::BusinessRuleViolation(format!(
                "工单{}同时属于{}个活动批次",
                work_order_id, n
            ))),
        }
    }

    fn map_batch(row: &Row<'_>) -> rusqlite::Result<CuringBatch> {
        let status_raw: String = row.get(2)?;
        let planned_start: String = row.get(5)?;
        let planned_end: String = row.get(6)?;
        let actual_start: Option<String> = row.get(7)?;
        let actual_end: Option<String> = row.get(8)?;
        let created_raw: String = row.get(10)?;
        let updated_raw: String = row.get(11)?;

        Ok(CuringBatch {
            batch_id: row.get(0)?,
            load_number: row.get(1)?,
            status: BatchStatus::parse(&status_raw)
                .ok_or_else(|| conversion_error(2, format!("未知批次状态: {}", status_raw)))?,
            autoclave_id: row.get(3)?,
            recipe_id: row.get(4)?,
            planned_window: PlannedWindow::new(
                parse_ts(5, &planned_start)?,
                parse_ts(6, &planned_end)?,
            ),
            actual_start: actual_start.map(|s| parse_ts(7, &s)).transpose()?,
            actual_end: actual_end.map(|s| parse_ts(8, &s)).transpose()?,
            created_by: row.get(9)?,
            created_at: parse_ts(10, &created_raw)?,
            updated_at: parse_ts(11, &updated_raw)?,
        })
    }

    fn map_item(row: &Row<'_>) -> rusqlite::Result<BatchItem> {
        let previous_raw: String = row.get(2)?;
        let added_raw: String = row.get(3)?;
        Ok(BatchItem {
            batch_id: row.get(0)?,
            work_order_id: row.get(1)?,
            previous_status: parse_status(2, &previous_raw)?,
            added_at: parse_ts(3, &added_raw)?,
        })
    }
}
