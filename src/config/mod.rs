// ==========================================
// 生产执行系统 - 配置层
// ==========================================
// 职责: 流转引擎运行参数管理
// 存储: config_kv 表 (scope_id='global')
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, WorkflowSettings};
