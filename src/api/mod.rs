// ==========================================
// 生产执行系统 - API 层
// ==========================================
// 职责: 对外业务接口（请求/响应 DTO + 错误分类）
// ==========================================

pub mod batch_api;
pub mod error;
pub mod production_api;

// 重导出核心类型
pub use batch_api::{AdvanceBatchRequest, AdvanceBatchResponse, BatchApi, CreateBatchRequestDto};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use production_api::{
    ActionMetadataDto, AvailableActionsResponse, EventSummary, PerformActionRequest, PerformActionResponse,
    ProductionApi, StatusOverrideRequest,
};
