// ==========================================
// 生产执行系统 - 装载兼容性检查
// ==========================================
// 职责: 批次创建前的纯校验
//   (a) 入批前状态
//   (b) 固化工艺一致
//   (c) 体积利用率（超阈值只告警,不拒绝）
// 红线: 不访问数据库, 不修改任何输入
// ==========================================

use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{Dimensions, WorkOrder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// CompatibilityReport - 通过时的检查报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub total_volume_m3: f64,
    pub envelope_volume_m3: f64,
    pub utilization_pct: f64,
    /// 未登记尺寸的工单（不计入体积）
    pub missing_dimensions: Vec<String>,
    pub warnings: Vec<String>,
}

// ==========================================
// CompatibilityRejection - 拒绝原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("装载不兼容: 状态不符 {wrong_status:?}, 工艺不符 {recipe_mismatch:?}")]
pub struct CompatibilityRejection {
    /// (工单ID, 当前状态)
    pub wrong_status: Vec<(String, String)>,
    pub recipe_mismatch: Vec<String>,
}

impl CompatibilityRejection {
    /// 全部问题工单ID（去重,保持输入顺序）
    pub fn offending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self
            .wrong_status
            .iter()
            .map(|(id, _)| id)
            .chain(self.recipe_mismatch.iter())
        {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// 检查候选工单能否装入同一批次
///
/// # 参数
/// - `candidates`: 候选工单
/// - `recipe_id`: 批次请求的固化工艺
/// - `envelope`: 热压罐内部尺寸
/// - `pre_batch_status`: 入批前必须处于的状态
/// - `warning_pct`: 利用率告警阈值
pub fn check(
    candidates: &[WorkOrder],
    recipe_id: &str,
    envelope: &Dimensions,
    pre_batch_status: WorkOrderStatus,
    warning_pct: f64,
) -> Result<CompatibilityReport, CompatibilityRejection> {
    let wrong_status: Vec<(String, String)> = candidates
        .iter()
        .filter(|wo| wo.status != pre_batch_status)
        .map(|wo| (wo.work_order_id.clone(), wo.status.to_db_string()))
        .collect();

    let recipe_mismatch: Vec<String> = candidates
        .iter()
        .filter(|wo| wo.cure_recipe_id.as_deref() != Some(recipe_id))
        .map(|wo| wo.work_order_id.clone())
        .collect();

    if !wrong_status.is_empty() || !recipe_mismatch.is_empty() {
        return Err(CompatibilityRejection {
            wrong_status,
            recipe_mismatch,
        });
    }

    let mut total_volume_m3 = 0.0;
    let mut missing_dimensions = Vec::new();
    for wo in candidates {
        match &wo.dimensions {
            Some(d) => total_volume_m3 += d.volume_m3() * f64::from(wo.quantity.max(1)),
            None => missing_dimensions.push(wo.work_order_id.clone()),
        }
    }

    let envelope_volume_m3 = envelope.volume_m3();
    let utilization_pct = if envelope_volume_m3 > 0.0 {
        total_volume_m3 / envelope_volume_m3 * 100.0
    } else {
        0.0
    };

    let mut warnings = Vec::new();
    if utilization_pct > warning_pct {
        warnings.push(format!(
            "体积利用率{:.1}%超过阈值{:.1}%",
            utilization_pct, warning_pct
        ));
    }
    if !missing_dimensions.is_empty() {
        warnings.push(format!(
            "以下工单未登记尺寸,未计入利用率: {}",
            missing_dimensions.join(", ")
        ));
    }

    Ok(CompatibilityReport {
        total_volume_m3,
        envelope_volume_m3,
        utilization_pct,
        missing_dimensions,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DepartmentType;

    const PRE_BATCH: WorkOrderStatus = WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom);

    fn candidate(id: &str, recipe: Option<&str>, dims: Option<Dimensions>) -> WorkOrder {
        let mut wo = WorkOrder::new(id, "P-100", 1);
        wo.status = PRE_BATCH;
        wo.cure_recipe_id = recipe.map(str::to_string);
        wo.dimensions = dims;
        wo
    }

    fn envelope() -> Dimensions {
        // 10 m³
        Dimensions::new(4000.0, 2500.0, 1000.0)
    }

    #[test]
    fn test_recipe_mismatch_lists_offenders() {
        let candidates = vec![
            candidate("WO-1", Some("RCP-180"), None),
            candidate("WO-2", Some("RCP-120"), None),
            candidate("WO-3", None, None),
        ];
        let err = check(&candidates, "RCP-180", &envelope(), PRE_BATCH, 100.0).unwrap_err();
        assert_eq!(err.recipe_mismatch, vec!["WO-2".to_string(), "WO-3".to_string()]);
        assert!(err.wrong_status.is_empty());
    }

    #[test]
    fn test_wrong_status_rejects() {
        let mut late = candidate("WO-1", Some("RCP-180"), None);
        late.status = WorkOrderStatus::InDepartment(DepartmentType::Cleanroom);
        let err = check(&[late], "RCP-180", &envelope(), PRE_BATCH, 100.0).unwrap_err();
        assert_eq!(
            err.wrong_status,
            vec![("WO-1".to_string(), "IN_CLEANROOM".to_string())]
        );
        assert_eq!(err.offending_ids(), vec!["WO-1".to_string()]);
    }

    #[test]
    fn test_over_capacity_is_only_a_warning() {
        // 2 × 6 m³ = 12 m³ → 120%
        let big = Some(Dimensions::new(3000.0, 2000.0, 1000.0));
        let candidates = vec![
            candidate("WO-1", Some("RCP-180"), big),
            candidate("WO-2", Some("RCP-180"), big),
        ];
        let report = check(&candidates, "RCP-180", &envelope(), PRE_BATCH, 100.0).unwrap();
        assert!((report.utilization_pct - 120.0).abs() < 1e-6);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_missing_dimensions_reported() {
        let candidates = vec![
            candidate("WO-1", Some("RCP-180"), Some(Dimensions::new(1000.0, 1000.0, 1000.0))),
            candidate("WO-2", Some("RCP-180"), None),
        ];
        let report = check(&candidates, "RCP-180", &envelope(), PRE_BATCH, 100.0).unwrap();
        assert!((report.utilization_pct - 10.0).abs() < 1e-6);
        assert_eq!(report.missing_dimensions, vec!["WO-2".to_string()]);
        assert_eq!(report.warnings.len(), 1);
    }
}
