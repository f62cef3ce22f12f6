// ==========================================
// 生产执行系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod curing_batch;
pub mod department;
pub mod production_event;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use curing_batch::{BatchItem, CuringBatch, PlannedWindow};
pub use department::{Autoclave, CureRecipe, Department, RoutingRule};
pub use production_event::{ActionMetadata, NewProductionEvent, ProductionEvent, StatusChange};
pub use types::{Actor, BatchStatus, DepartmentType, EventKind, Priority, WorkOrderStatus};
pub use work_order::{Dimensions, WorkOrder};
