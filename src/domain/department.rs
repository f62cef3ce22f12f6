// ==========================================
// 生产执行系统 - 部门与资源目录
// ==========================================
// 由管理工具维护,引擎只读
// ==========================================

use crate::domain::types::DepartmentType;
use crate::domain::work_order::Dimensions;
use serde::{Deserialize, Serialize};

// ==========================================
// Department - 生产部门
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub department_id: String,
    pub code: String,
    pub name: String,
    pub department_type: DepartmentType,
    pub routing_position: i32, // 路由顺序位置
    pub is_active: bool,
}

// ==========================================
// Autoclave - 热压罐（容量受限资源）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoclave {
    pub autoclave_id: String,
    pub code: String,
    pub department_id: String, // 所属热压罐部门
    pub envelope: Dimensions,  // 罐内可用空间
    pub is_active: bool,
}

// ==========================================
// CureRecipe - 固化工艺（工艺曲线）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CureRecipe {
    pub recipe_id: String,
    pub code: String,
    pub name: String,
}

// ==========================================
// RoutingRule - 路由表条目
// ==========================================
// product_type 为 None 表示默认路由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub product_type: Option<String>,
    pub from_department_type: DepartmentType,
    pub next_department_type: DepartmentType,
}
