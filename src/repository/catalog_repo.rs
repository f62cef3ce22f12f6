// ==========================================
// 生产执行系统 - 部门/热压罐/固化工艺目录仓储
// ==========================================
// 对齐: department / autoclave / cure_recipe 表
// 说明: 目录由管理工具维护,引擎侧只读; insert 供初始化与测试使用
// ==========================================

use crate::domain::department::{Autoclave, CureRecipe, Department};
use crate::domain::types::DepartmentType;
use crate::domain::work_order::Dimensions;
use crate::repository::conversion_error;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row};

// ==========================================
// DepartmentRepository - 部门仓储
// ==========================================
pub struct DepartmentRepository;

impl DepartmentRepository {
    pub fn insert(conn: &Connection, dept: &Department) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO department
               (department_id, code, name, department_type, routing_position, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                dept.department_id,
                dept.code,
                dept.name,
                dept.department_type.as_str(),
                dept.routing_position,
                dept.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, department_id: &str) -> RepositoryResult<Option<Department>> {
        let dept = conn
            .query_row(
                r#"SELECT department_id, code, name, department_type, routing_position, is_active
                   FROM department WHERE department_id = ?1"#,
                params![department_id],
                Self::map_row,
            )
            .optional()?;
        Ok(dept)
    }

    /// 指定类型的首个启用部门（按路由位置）
    pub fn find_active_by_type(
        conn: &Connection,
        department_type: DepartmentType,
    ) -> RepositoryResult<Option<Department>> {
        let dept = conn
            .query_row(
                r#"SELECT department_id, code, name, department_type, routing_position, is_active
                   FROM department
                   WHERE department_type = ?1 AND is_active = 1
                   ORDER BY routing_position, department_id
                   LIMIT 1"#,
                params![department_type.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(dept)
    }

    pub fn list_active(conn: &Connection) -> RepositoryResult<Vec<Department>> {
        let mut stmt = conn.prepare(
            r#"SELECT department_id, code, name, department_type, routing_position, is_active
               FROM department WHERE is_active = 1
               ORDER BY routing_position, department_id"#,
        )?;
        let depts = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(depts)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Department> {
        let type_raw: String = row.get(3)?;
        Ok(Department {
            department_id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            department_type: DepartmentType::parse(&type_raw)
                .ok_or_else(|| conversion_error(3, format!("未知部门类型: {}", type_raw)))?,
            routing_position: row.get(4)?,
            is_active: row.get(5)?,
        })
    }
}

// ==========================================
// AutoclaveRepository - 热压罐仓储
// ==========================================
pub struct AutoclaveRepository;

impl AutoclaveRepository {
    pub fn insert(conn: &Connection, autoclave: &Autoclave) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO autoclave
               (autoclave_id, code, department_id, length_mm, width_mm, height_mm, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                autoclave.autoclave_id,
                autoclave.code,
                autoclave.department_id,
                autoclave.envelope.length_mm,
                autoclave.envelope.width_mm,
                autoclave.envelope.height_mm,
                autoclave.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, autoclave_id: &str) -> RepositoryResult<Option<Autoclave>> {
        let autoclave = conn
            .query_row(
                r#"SELECT autoclave_id, code, department_id, length_mm, width_mm, height_mm, is_active
                   FROM autoclave WHERE autoclave_id = ?1"#,
                params![autoclave_id],
                |row| {
                    Ok(Autoclave {
                        autoclave_id: row.get(0)?,
                        code: row.get(1)?,
                        department_id: row.get(2)?,
                        envelope: Dimensions::new(row.get(3)?, row.get(4)?, row.get(5)?),
                        is_active: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(autoclave)
    }
}

// ==========================================
// CureRecipeRepository - 固化工艺仓储
// ==========================================
pub struct CureRecipeRepository;

impl CureRecipeRepository {
    pub fn insert(conn: &Connection, recipe: &CureRecipe) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO cure_recipe (recipe_id, code, name) VALUES (?1, ?2, ?3)",
            params![recipe.recipe_id, recipe.code, recipe.name],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, recipe_id: &str) -> RepositoryResult<Option<CureRecipe>> {
        let recipe = conn
            .query_row(
                "SELECT recipe_id, code, name FROM cure_recipe WHERE recipe_id = ?1",
                params![recipe_id],
                |row| {
                    Ok(CureRecipe {
                        recipe_id: row.get(0)?,
                        code: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(recipe)
    }
}
