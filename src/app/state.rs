// ==========================================
// 生产执行系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有组件共享同一条 SQLite 连接,写操作由 UnitOfWork 串行化
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{BatchApi, ProductionApi};
use crate::config::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, seed_defaults, UnitOfWork};
use crate::engine::{
    BatchManager, CapabilityChecker, RoleBasedCapability, WorkflowEngine, WorkflowEventPublisher,
};
use crate::repository::error::RepositoryResult;

/// 应用状态
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    pub production_api: Arc<ProductionApi>,
    pub batch_api: Arc<BatchApi>,

    pub workflow_engine: Arc<WorkflowEngine>,
    pub batch_manager: Arc<BatchManager>,
    pub config_manager: Arc<ConfigManager>,
    pub unit_of_work: Arc<UnitOfWork>,
}

impl AppState {
    /// 打开数据库、建表、写入默认目录并装配全部组件
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)?;
        ensure_schema(&conn)?;
        seed_defaults(&conn)?;

        Ok(Self::assemble(
            db_path,
            Arc::new(Mutex::new(conn)),
            Arc::new(RoleBasedCapability),
            None,
        ))
    }

    /// 使用已初始化的连接装配（测试/嵌入场景）
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        capability: Arc<dyn CapabilityChecker>,
        publisher: Option<Arc<dyn WorkflowEventPublisher>>,
    ) -> Self {
        Self::assemble(":memory:".to_string(), conn, capability, publisher)
    }

    fn assemble(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        capability: Arc<dyn CapabilityChecker>,
        publisher: Option<Arc<dyn WorkflowEventPublisher>>,
    ) -> Self {
        let unit_of_work = Arc::new(UnitOfWork::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        let mut workflow_engine = WorkflowEngine::new(unit_of_work.clone(), config_manager.clone(), capability.clone());
        let mut batch_manager = BatchManager::new(unit_of_work.clone(), config_manager.clone(), capability);
        if let Some(publisher) = publisher {
            workflow_engine = workflow_engine.with_publisher(publisher.clone());
            batch_manager = batch_manager.with_publisher(publisher);
        }
        let workflow_engine = Arc::new(workflow_engine);
        let batch_manager = Arc::new(batch_manager);

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            production_api: Arc::new(ProductionApi::new(workflow_engine.clone())),
            batch_api: Arc::new(BatchApi::new(batch_manager.clone())),
            workflow_engine,
            batch_manager,
            config_manager,
            unit_of_work,
        }
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 `MES_WORKFLOW_DB_PATH` → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MES_WORKFLOW_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./mes_workflow.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("mes-workflow-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("mes-workflow");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("无法创建数据目录 {}: {}", path.display(), e);
        }
        path = path.join("mes_workflow.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_from_connection_wires_apis() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        let state = AppState::from_connection(Arc::new(Mutex::new(conn)), Arc::new(RoleBasedCapability), None);

        let actions = state.production_api.available_actions("missing", "DEPT-NDI");
        assert!(matches!(actions, Err(crate::api::ApiError::NotFound(_))));
        assert!(state.batch_api.find_batch_by_work_order("missing").unwrap().is_none());
    }
}
