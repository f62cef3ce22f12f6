// ==========================================
// 生产执行系统 - SQLite 连接初始化与事务边界
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 幂等建表与默认目录/路由表种子数据
// - UnitOfWork: 显式 begin/commit/rollback,所有多行变更在同一事务内
// ==========================================

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::types::DepartmentType;
use crate::repository::error::RepositoryError;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置; 超时后写锁竞争以 Conflict 形式上报
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// Schema
// ==========================================

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS department (
    department_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    department_type TEXT NOT NULL,
    routing_position INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS cure_recipe (
    recipe_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS autoclave (
    autoclave_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    department_id TEXT NOT NULL REFERENCES department(department_id),
    length_mm REAL NOT NULL,
    width_mm REAL NOT NULL,
    height_mm REAL NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS work_order (
    work_order_id TEXT PRIMARY KEY,
    product_code TEXT NOT NULL,
    product_type TEXT,
    quantity INTEGER NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    hold_previous_status TEXT,
    length_mm REAL,
    width_mm REAL,
    height_mm REAL,
    cure_recipe_id TEXT REFERENCES cure_recipe(recipe_id),
    due_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS production_event (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
    department_id TEXT NOT NULL REFERENCES department(department_id),
    actor_id TEXT,
    is_automatic INTEGER NOT NULL DEFAULT 0,
    kind TEXT NOT NULL,
    event_ts TEXT NOT NULL,
    duration_minutes INTEGER,
    notes TEXT,
    batch_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_event_wo_dept_ts
    ON production_event(work_order_id, department_id, event_ts);

CREATE TABLE IF NOT EXISTS work_order_status_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    actor_id TEXT,
    reason TEXT NOT NULL,
    changed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_status_log_wo ON work_order_status_log(work_order_id, log_id);

CREATE TABLE IF NOT EXISTS curing_batch (
    batch_id TEXT PRIMARY KEY,
    load_number TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    autoclave_id TEXT NOT NULL REFERENCES autoclave(autoclave_id),
    recipe_id TEXT NOT NULL REFERENCES cure_recipe(recipe_id),
    planned_start TEXT NOT NULL,
    planned_end TEXT NOT NULL,
    actual_start TEXT,
    actual_end TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_batch_autoclave_status ON curing_batch(autoclave_id, status);

CREATE TABLE IF NOT EXISTS batch_item (
    batch_id TEXT NOT NULL REFERENCES curing_batch(batch_id),
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
    previous_status TEXT NOT NULL,
    added_at TEXT NOT NULL,
    PRIMARY KEY (batch_id, work_order_id)
);
CREATE INDEX IF NOT EXISTS idx_batch_item_wo ON batch_item(work_order_id);

CREATE TABLE IF NOT EXISTS routing_rule (
    rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_type TEXT,
    from_department_type TEXT NOT NULL,
    next_department_type TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_routing_rule_key
    ON routing_rule(IFNULL(product_type, ''), from_department_type);
"#;

/// 幂等建表并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            warn!(
                db_version = v,
                code_version = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前代码,可能存在兼容问题"
            );
        }
        _ => {}
    }
    Ok(())
}

// ==========================================
// 默认种子数据
// ==========================================

/// 默认路由: 蜂窝 → 净化间 → 热压罐 → 无损检测 → 数控 → 喷涂 → 装配 → 质检; 发动机 → 装配
pub const DEFAULT_ROUTING: [(DepartmentType, DepartmentType); 8] = [
    (DepartmentType::Honeycomb, DepartmentType::Cleanroom),
    (DepartmentType::Cleanroom, DepartmentType::Autoclave),
    (DepartmentType::Autoclave, DepartmentType::Ndi),
    (DepartmentType::Ndi, DepartmentType::NumericControl),
    (DepartmentType::NumericControl, DepartmentType::Painting),
    (DepartmentType::Painting, DepartmentType::Assembly),
    (DepartmentType::Assembly, DepartmentType::QualityControl),
    (DepartmentType::Engines, DepartmentType::Assembly),
];

/// 种子数据: 部门目录（每种类型一个）、默认热压罐、默认工艺、默认路由表
///
/// 已存在的行不会被覆盖。部门ID约定为 `DEPT-<TYPE>`。
pub fn seed_defaults(conn: &Connection) -> rusqlite::Result<()> {
    let routing_position = |t: DepartmentType| -> i32 {
        match t {
            DepartmentType::Honeycomb => 10,
            DepartmentType::Engines => 15,
            DepartmentType::Cleanroom => 20,
            DepartmentType::Autoclave => 30,
            DepartmentType::Ndi => 40,
            DepartmentType::NumericControl => 50,
            DepartmentType::Painting => 60,
            DepartmentType::Assembly => 70,
            DepartmentType::QualityControl => 80,
        }
    };

    for t in DepartmentType::ALL {
        conn.execute(
            r#"INSERT OR IGNORE INTO department
               (department_id, code, name, department_type, routing_position, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, 1)"#,
            params![
                default_department_id(t),
                t.as_str(),
                t.as_str(),
                t.as_str(),
                routing_position(t),
            ],
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO cure_recipe (recipe_id, code, name) VALUES ('RCP-180', 'CURE-180', '180°C 标准固化')",
        [],
    )?;
    conn.execute(
        r#"INSERT OR IGNORE INTO autoclave
           (autoclave_id, code, department_id, length_mm, width_mm, height_mm, is_active)
           VALUES ('AC-01', 'AC-01', ?1, 6000.0, 2500.0, 2500.0, 1)"#,
        params![default_department_id(DepartmentType::Autoclave)],
    )?;

    for (from, next) in DEFAULT_ROUTING {
        conn.execute(
            r#"INSERT OR IGNORE INTO routing_rule (product_type, from_department_type, next_department_type)
               VALUES (NULL, ?1, ?2)"#,
            params![from.as_str(), next.as_str()],
        )?;
    }

    info!("默认部门目录与路由表已就绪");
    Ok(())
}

/// 默认部门ID约定
pub fn default_department_id(t: DepartmentType) -> String {
    format!("DEPT-{}", t.as_str())
}

// ==========================================
// UnitOfWork - 显式事务边界
// ==========================================
// 使用 BEGIN IMMEDIATE: 读取前置条件之前即持有写锁,
// 同一工单上的两个并发动作不可能同时看到同一个“最后事件”
pub struct UnitOfWork {
    conn: Arc<Mutex<Connection>>,
}

impl UnitOfWork {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接（供只读组件复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// 只读访问,不开启写事务
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        f(&guard)
    }

    /// 在单个写事务内执行
    ///
    /// # 说明
    /// - 闭包返回 Ok: 提交
    /// - 闭包返回 Err: 回滚,错误原样返回
    /// - 提交失败（如写锁超时）: 以 RepositoryError 上报,不会留下部分写入
    pub fn execute<T, E>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RepositoryError> + std::fmt::Display,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(RepositoryError::from)?;
                debug!(op, "事务已提交");
                Ok(value)
            }
            Err(err) => {
                warn!(op, error = %err, "事务回滚");
                if let Err(rb_err) = tx.rollback() {
                    error!(op, error = %rb_err, "事务回滚失败");
                }
                Err(err)
            }
        }
    }
}
