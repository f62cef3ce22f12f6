// ==========================================
// 生产执行系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 车间工单流转（部门状态机 + 热压罐固化批次）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/建表/事务边界）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Actor, BatchStatus, DepartmentType, EventKind, Priority, WorkOrderStatus};

// 领域实体
pub use domain::{
    ActionMetadata, Autoclave, BatchItem, CureRecipe, CuringBatch, Department, Dimensions,
    PlannedWindow, ProductionEvent, RoutingRule, WorkOrder,
};

// 引擎
pub use engine::{
    ActorContext, AutoRouter, BatchManager, Role, RoleBasedCapability, WorkflowEngine, WorkflowError,
};

// API
pub use api::{ApiError, BatchApi, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产执行系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
