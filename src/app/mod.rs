// ==========================================
// 生产执行系统 - 应用层
// ==========================================
// 职责: 组件装配与数据库路径解析
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
