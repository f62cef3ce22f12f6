// ==========================================
// 生产执行系统 - 部门操作权限
// ==========================================
// 职责: 判定操作者能否在指定部门执行动作
// 说明: 引擎只依赖 CapabilityChecker trait,
//       默认实现按角色判定,可替换为外部权限服务适配器
// ==========================================

use crate::domain::department::Department;
use crate::domain::types::Actor;
use serde::{Deserialize, Serialize};

// ==========================================
// 角色与会话上下文
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Supervisor,
    Operator,
}

/// 已认证会话的操作者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub user_id: String,
    pub role: Role,
    /// 操作员所属部门; 管理员/主管可为空
    pub department_id: Option<String>,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, role: Role, department_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            department_id,
        }
    }

    pub fn operator(user_id: impl Into<String>, department_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Operator, Some(department_id.into()))
    }

    pub fn supervisor(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Supervisor, None)
    }

    pub fn actor(&self) -> Actor {
        Actor::human(self.user_id.clone())
    }

    /// 可执行工单终态转换（完工/挂起/取消）
    pub fn can_override(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Supervisor)
    }
}

// ==========================================
// CapabilityChecker Trait
// ==========================================
pub trait CapabilityChecker: Send + Sync {
    fn can_operate(&self, actor: &ActorContext, department: &Department) -> bool;
}

/// 按角色判定: 管理员/主管可操作任意启用部门, 操作员仅限本部门
#[derive(Debug, Clone, Default)]
pub struct RoleBasedCapability;

impl CapabilityChecker for RoleBasedCapability {
    fn can_operate(&self, actor: &ActorContext, department: &Department) -> bool {
        if !department.is_active {
            return false;
        }
        match actor.role {
            Role::Admin | Role::Supervisor => true,
            Role::Operator => actor.department_id.as_deref() == Some(department.department_id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DepartmentType;

    fn dept(id: &str, active: bool) -> Department {
        Department {
            department_id: id.to_string(),
            code: id.to_string(),
            name: id.to_string(),
            department_type: DepartmentType::Ndi,
            routing_position: 40,
            is_active: active,
        }
    }

    #[test]
    fn test_operator_limited_to_own_department() {
        let checker = RoleBasedCapability;
        let op = ActorContext::operator("u-1", "DEPT-NDI");
        assert!(checker.can_operate(&op, &dept("DEPT-NDI", true)));
        assert!(!checker.can_operate(&op, &dept("DEPT-PAINTING", true)));
        assert!(!op.can_override());
    }

    #[test]
    fn test_supervisor_blocked_only_by_inactive_department() {
        let checker = RoleBasedCapability;
        let sup = ActorContext::supervisor("boss");
        assert!(checker.can_operate(&sup, &dept("DEPT-PAINTING", true)));
        assert!(!checker.can_operate(&sup, &dept("DEPT-PAINTING", false)));
        assert!(sup.can_override());
    }
}
