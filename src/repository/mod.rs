// ==========================================
// 生产执行系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化; 方法接收 &Connection,
//       由 UnitOfWork 决定事务边界（Transaction 可解引用为 Connection）
// ==========================================

pub mod catalog_repo;
pub mod curing_batch_repo;
pub mod error;
pub mod production_event_repo;
pub mod routing_repo;
pub mod work_order_repo;

// 重导出核心仓储
pub use catalog_repo::{AutoclaveRepository, CureRecipeRepository, DepartmentRepository};
pub use curing_batch_repo::CuringBatchRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use production_event_repo::ProductionEventRepository;
pub use routing_repo::RoutingRepository;
pub use work_order_repo::WorkOrderRepository;

use chrono::{NaiveDate, NaiveDateTime};

/// 时间戳存储格式（毫秒精度,字典序即时间序）
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 解析时间戳（兼容无小数秒的旧数据）
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| conversion_error(idx, format!("时间戳格式错误 '{}': {}", raw, e)))
}

pub(crate) fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| conversion_error(idx, format!("日期格式错误 '{}': {}", raw, e)))
}

/// 列值无法转换为领域类型
pub(crate) fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}
