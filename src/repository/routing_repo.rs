// ==========================================
// 生产执行系统 - 路由表仓储
// ==========================================
// 对齐: routing_rule 表
// 查找顺序: 产品类型专用规则 → 默认规则(product_type IS NULL)
// ==========================================

use crate::domain::department::RoutingRule;
use crate::domain::types::DepartmentType;
use crate::repository::conversion_error;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};

pub struct RoutingRepository;

impl RoutingRepository {
    /// 新增或覆盖一条路由规则
    pub fn upsert(conn: &Connection, rule: &RoutingRule) -> RepositoryResult<()> {
        conn.execute(
            r#"DELETE FROM routing_rule
               WHERE IFNULL(product_type, '') = IFNULL(?1, '') AND from_department_type = ?2"#,
            params![rule.product_type, rule.from_department_type.as_str()],
        )?;
        conn.execute(
            r#"INSERT INTO routing_rule (product_type, from_department_type, next_department_type)
               VALUES (?1, ?2, ?3)"#,
            params![
                rule.product_type,
                rule.from_department_type.as_str(),
                rule.next_department_type.as_str(),
            ],
        )?;
        Ok(())
    }

    /// 查找下一部门类型
    pub fn find_next(
        conn: &Connection,
        product_type: Option<&str>,
        from: DepartmentType,
    ) -> RepositoryResult<Option<DepartmentType>> {
        let raw: Option<String> = conn
            .query_row(
                r#"SELECT next_department_type FROM routing_rule
                   WHERE from_department_type = ?1
                     AND (product_type = ?2 OR product_type IS NULL)
                   ORDER BY CASE WHEN product_type IS NULL THEN 1 ELSE 0 END
                   LIMIT 1"#,
                params![from.as_str(), product_type],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(s) => {
                let next = DepartmentType::parse(&s)
                    .ok_or_else(|| conversion_error(0, format!("未知部门类型: {}", s)))?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    pub fn list(conn: &Connection) -> RepositoryResult<Vec<RoutingRule>> {
        let mut stmt = conn.prepare(
            r#"SELECT product_type, from_department_type, next_department_type
               FROM routing_rule ORDER BY IFNULL(product_type, ''), from_department_type"#,
        )?;
        let rules = stmt
            .query_map([], |row| {
                let from_raw: String = row.get(1)?;
                let next_raw: String = row.get(2)?;
                Ok(RoutingRule {
                    product_type: row.get(0)?,
                    from_department_type: DepartmentType::parse(&from_raw)
                        .ok_or_else(|| conversion_error(1, format!("未知部门类型: {}", from_raw)))?,
                    next_department_type: DepartmentType::parse(&next_raw)
                        .ok_or_else(|| conversion_error(2, format!("未知部门类型: {}", next_raw)))?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_specific_rule_wins_over_default() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        crate::db::seed_defaults(&conn).unwrap();

        RoutingRepository::upsert(
            &conn,
            &RoutingRule {
                product_type: Some("FAIRING".to_string()),
                from_department_type: DepartmentType::Ndi,
                next_department_type: DepartmentType::Painting,
            },
        )
        .unwrap();

        assert_eq!(
            RoutingRepository::find_next(&conn, Some("FAIRING"), DepartmentType::Ndi).unwrap(),
            Some(DepartmentType::Painting)
        );
        assert_eq!(
            RoutingRepository::find_next(&conn, Some("PANEL"), DepartmentType::Ndi).unwrap(),
            Some(DepartmentType::NumericControl)
        );
        assert_eq!(
            RoutingRepository::find_next(&conn, None, DepartmentType::QualityControl).unwrap(),
            None
        );
    }
}
