// ==========================================
// 生产执行系统 - 主入口
// ==========================================
// 职责: 初始化日志、打开/创建数据库、建表并写入默认目录与路由表
// 用法: mes-workflow [数据库路径]
// 环境变量:
//   MES_WORKFLOW_DB_PATH  数据库路径（命令行参数优先）
//   MES_WORKFLOW_LOG_JSON 设为 1 时输出 JSON 日志
//   RUST_LOG              日志级别
// ==========================================

use anyhow::Context;
use mes_workflow::app::{get_default_db_path, AppState};
use mes_workflow::repository::{DepartmentRepository, RoutingRepository};

fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("MES_WORKFLOW_LOG_JSON")
        .map(|v| v.trim() == "1")
        .unwrap_or(false);
    if json_logs {
        mes_workflow::logging::init_json();
    } else {
        mes_workflow::logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} 系统版本: {}", mes_workflow::APP_NAME, mes_workflow::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path.clone()).with_context(|| format!("无法初始化数据库 {}", db_path))?;

    let (departments, rules) = state
        .unit_of_work
        .read(|conn| Ok::<_, mes_workflow::repository::RepositoryError>((
            DepartmentRepository::list_active(conn)?,
            RoutingRepository::list(conn)?,
        )))
        .context("读取部门目录失败")?;

    for dept in &departments {
        tracing::info!(
            department_id = %dept.department_id,
            department_type = %dept.department_type,
            routing_position = dept.routing_position,
            "部门"
        );
    }
    for rule in &rules {
        tracing::info!(
            product_type = rule.product_type.as_deref().unwrap_or("*"),
            from = %rule.from_department_type,
            next = %rule.next_department_type,
            "路由规则"
        );
    }

    let settings = state.config_manager.settings().context("读取运行参数失败")?;
    tracing::info!(?settings, "运行参数");
    tracing::info!("数据库就绪: {} 个部门, {} 条路由规则", departments.len(), rules.len());
    Ok(())
}
