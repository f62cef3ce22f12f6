// ==========================================
// 生产执行系统 - 引擎层错误类型
// ==========================================
// 分类: 权限 / 校验 / 未找到 / 冲突 / 数据完整性
// 红线: 校验错误必须携带足够上下文(当前状态、请求动作、合法动作、问题工单),
//       绝不静默纠正; 完整性错误只上报,不自动修复
// ==========================================

use crate::domain::types::{EventKind, WorkOrderStatus};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// 操作者无目标部门权限（不自动重试）
    #[error("无部门操作权限: actor={actor}, department={department_id}")]
    Capability { actor: String, department_id: String },

    /// 非法动作/非法批次状态转换/批次组成不合规
    #[error("校验失败: {message}")]
    Validation {
        message: String,
        current_status: Option<String>,
        requested: Option<String>,
        legal_actions: Vec<EventKind>,
        offending_ids: Vec<String>,
    },

    #[error("{entity}不存在: {id}")]
    NotFound { entity: String, id: String },

    /// 并发事务竞争,可退避重试
    #[error("事务冲突(可重试): {0}")]
    Conflict(String),

    /// 读取时发现事件序列或批次成员与不变量不一致
    #[error("数据完整性错误: {0}")]
    Integrity(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            message: message.into(),
            current_status: None,
            requested: None,
            legal_actions: Vec::new(),
            offending_ids: Vec::new(),
        }
    }

    /// 当前状态下请求了非法动作
    pub fn illegal_action(
        work_order_id: &str,
        status: WorkOrderStatus,
        requested: EventKind,
        legal_actions: Vec<EventKind>,
    ) -> Self {
        let legal = legal_actions
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        WorkflowError::Validation {
            message: format!(
                "工单{}当前状态{}不允许{}, 合法动作: [{}]",
                work_order_id, status, requested, legal
            ),
            current_status: Some(status.to_db_string()),
            requested: Some(requested.as_str().to_string()),
            legal_actions,
            offending_ids: vec![work_order_id.to_string()],
        }
    }

    /// 批次状态转换不在状态表内
    pub fn invalid_batch_transition(batch_id: &str, from: &str, to: &str) -> Self {
        WorkflowError::Validation {
            message: format!("批次{}不允许从{}转换到{}", batch_id, from, to),
            current_status: Some(from.to_string()),
            requested: Some(to.to_string()),
            legal_actions: Vec::new(),
            offending_ids: Vec::new(),
        }
    }

    /// 批量操作中存在不合规工单
    pub fn rejected_members(message: impl Into<String>, offending_ids: Vec<String>) -> Self {
        WorkflowError::Validation {
            message: message.into(),
            current_status: None,
            requested: None,
            legal_actions: Vec::new(),
            offending_ids,
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        WorkflowError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否可安全重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict(_))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => WorkflowError::Conflict(msg),
            RepositoryError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            RepositoryError::BusinessRuleViolation(msg) => WorkflowError::Integrity(msg),
            other => WorkflowError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type WorkflowResult<T> = Result<T, WorkflowError>;
