// ==========================================
// 生产执行系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 说明: 引擎在开启写事务之前读取一次设置快照,
//       避免在持有共享连接锁时重入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{DepartmentType, WorkOrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// WorkflowSettings - 运行参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// 入批前工单必须处于的状态
    pub pre_batch_status: WorkOrderStatus,
    /// 批次释放后成员进入的部门类型
    pub release_department_type: DepartmentType,
    /// 热压罐体积利用率告警阈值（百分比）
    pub capacity_warning_pct: f64,
    /// EXIT 未给出时长时按事件序列自动计算
    pub autofill_exit_duration: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            pre_batch_status: WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom),
            release_department_type: DepartmentType::Ndi,
            capacity_warning_pct: 100.0,
            autofill_exit_duration: true,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
               ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')"#,
            params![key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    /// 全部 global 配置快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// 读取运行参数; 缺省键回落到默认值, 非法值报 FieldValueError
    pub fn settings(&self) -> RepositoryResult<WorkflowSettings> {
        let defaults = WorkflowSettings::default();

        let pre_batch_status = match self.get_global_config_value(config_keys::PRE_BATCH_STATUS)? {
            Some(raw) => WorkOrderStatus::parse(&raw).ok_or_else(|| {
                RepositoryError::field(config_keys::PRE_BATCH_STATUS, format!("未知工单状态: {}", raw))
            })?,
            None => defaults.pre_batch_status,
        };

        let release_department_type =
            match self.get_global_config_value(config_keys::RELEASE_DEPARTMENT_TYPE)? {
                Some(raw) => DepartmentType::parse(&raw).ok_or_else(|| {
                    RepositoryError::field(
                        config_keys::RELEASE_DEPARTMENT_TYPE,
                        format!("未知部门类型: {}", raw),
                    )
                })?,
                None => defaults.release_department_type,
            };

        let capacity_warning_pct =
            match self.get_global_config_value(config_keys::CAPACITY_WARNING_PCT)? {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| *v > 0.0)
                    .ok_or_else(|| {
                        RepositoryError::field(
                            config_keys::CAPACITY_WARNING_PCT,
                            format!("必须为正数: {}", raw),
                        )
                    })?,
                None => defaults.capacity_warning_pct,
            };

        let autofill_exit_duration =
            match self.get_global_config_value(config_keys::AUTOFILL_EXIT_DURATION)? {
                Some(raw) => is_true(&raw),
                None => defaults.autofill_exit_duration,
            };

        Ok(WorkflowSettings {
            pre_batch_status,
            release_department_type,
            capacity_warning_pct,
            autofill_exit_duration,
        })
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 批次
    pub const PRE_BATCH_STATUS: &str = "batch.pre_batch_status";
    pub const RELEASE_DEPARTMENT_TYPE: &str = "batch.release_department_type";
    pub const CAPACITY_WARNING_PCT: &str = "batch.capacity_warning_pct";

    // 流转
    pub const AUTOFILL_EXIT_DURATION: &str = "workflow.autofill_exit_duration";
}
