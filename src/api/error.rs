// ==========================================
// 生产执行系统 - API层错误类型
// ==========================================
// 职责: 把引擎错误转换为对外错误分类
//   Unauthorized / Forbidden / NotFound / ValidationError / Conflict / IntegrityError
// 说明: 校验错误附带当前状态与合法动作,供前端向操作员解释
// ==========================================

use crate::engine::error::WorkflowError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    /// 无会话
    #[error("未登录")]
    Unauthorized,

    /// 无部门权限
    #[error("无权限: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("校验失败: {message}")]
    ValidationError {
        message: String,
        current_status: Option<String>,
        requested: Option<String>,
        legal_actions: Vec<String>,
        offending_ids: Vec<String>,
    },

    /// 可退避重试
    #[error("并发冲突: {0}")]
    Conflict(String),

    #[error("数据完整性错误: {0}")]
    IntegrityError(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::IntegrityError(_) => "INTEGRITY_ERROR",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }

    /// 对外错误响应
    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            ApiError::ValidationError {
                current_status,
                requested,
                legal_actions,
                offending_ids,
                ..
            } => Some(serde_json::json!({
                "currentStatus": current_status,
                "requested": requested,
                "legalActions": legal_actions,
                "offendingIds": offending_ids,
            })),
            _ => None,
        };
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
            details,
        }
    }
}

/// 错误响应（返回给前端）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    pub details: Option<serde_json::Value>,
}

// ==========================================
// 从 WorkflowError 转换
// ==========================================
impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Capability { actor, department_id } => {
                ApiError::Forbidden(format!("用户{}无部门{}的操作权限", actor, department_id))
            }
            WorkflowError::Validation {
                message,
                current_status,
                requested,
                legal_actions,
                offending_ids,
            } => ApiError::ValidationError {
                message,
                current_status,
                requested,
                legal_actions: legal_actions.iter().map(|k| k.as_str().to_string()).collect(),
                offending_ids,
            },
            WorkflowError::NotFound { entity, id } => ApiError::NotFound(format!("{}(id={})不存在", entity, id)),
            WorkflowError::Conflict(msg) => ApiError::Conflict(msg),
            WorkflowError::Integrity(msg) => ApiError::IntegrityError(msg),
            WorkflowError::Repository(repo) => repo.into(),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::NotFound { entity, id } => ApiError::NotFound(format!("{}(id={})不存在", entity, id)),
            RepositoryError::BusinessRuleViolation(msg) => ApiError::IntegrityError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::LockError(msg) => ApiError::InternalError(format!("数据库锁获取失败: {}", msg)),
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::DatabaseError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DepartmentType, EventKind, WorkOrderStatus};

    #[test]
    fn test_validation_error_keeps_legal_actions() {
        let err: ApiError = WorkflowError::illegal_action(
            "WO-7",
            WorkOrderStatus::InDepartment(DepartmentType::Painting),
            EventKind::Entry,
            vec![EventKind::Exit, EventKind::Pause, EventKind::Note],
        )
        .into();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        let response = err.to_response();
        let details = response.details.unwrap();
        assert_eq!(details["currentStatus"], "IN_PAINTING");
        assert_eq!(details["legalActions"], serde_json::json!(["EXIT", "PAUSE", "NOTE"]));
    }

    #[test]
    fn test_capability_maps_to_forbidden() {
        let err: ApiError = WorkflowError::Capability {
            actor: "op-1".to_string(),
            department_id: "DEPT-NDI".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err: ApiError = WorkflowError::from(RepositoryError::Conflict("database is locked".to_string())).into();
        assert_eq!(err.code(), "CONFLICT");
        assert!(err.to_response().retryable);
    }
}
