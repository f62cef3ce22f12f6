// ==========================================
// 生产执行系统 - 引擎层
// ==========================================
// 职责: 流转规则、自动转序、批次生命周期
// 红线: Engine 不拼 SQL, 数据访问全部经由 Repository;
//       每个写操作是一个 UnitOfWork 事务
// ==========================================

pub mod batch_manager;
pub mod capability;
pub mod compatibility;
pub mod error;
pub mod events;
pub mod routing;
pub mod transition;
pub mod workflow;

// 重导出核心引擎
pub use batch_manager::{
    BatchAdvance, BatchCreation, BatchDetail, BatchManager, CreateBatchRequest, MemberRemoval,
};
pub use capability::{ActorContext, CapabilityChecker, Role, RoleBasedCapability};
pub use compatibility::{CompatibilityRejection, CompatibilityReport};
pub use error::{WorkflowError, WorkflowResult};
pub use events::{NoOpEventPublisher, OptionalEventPublisher, WorkflowEvent, WorkflowEventPublisher};
pub use routing::{AutoRouter, RouteOutcome};
pub use transition::{active_duration_minutes, legal_actions, replay, IntegrityViolation};
pub use workflow::{
    ActionOutcome, ActionRequest, AvailableActions, StatusOverride, WorkOrderTimeline, WorkflowEngine,
};
