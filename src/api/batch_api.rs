// ==========================================
// 生产执行系统 - 固化批次 API
// ==========================================
// 职责: 批次创建、推进（扫码确认）、移出成员、按工单查询
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::production_api::require_id;
use crate::domain::curing_batch::{CuringBatch, PlannedWindow};
use crate::domain::types::BatchStatus;
use crate::engine::batch_manager::{BatchCreation, BatchDetail, BatchManager, CreateBatchRequest, MemberRemoval};
use crate::engine::capability::ActorContext;

// ==========================================
// DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequestDto {
    pub autoclave_id: String,
    pub recipe_id: String,
    pub planned_start: NaiveDateTime,
    pub planned_end: NaiveDateTime,
    pub work_order_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceBatchRequest {
    pub batch_id: String,
    pub target_status: BatchStatus,
    pub scanned_work_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceBatchResponse {
    pub batch: CuringBatch,
    pub message: String,
    pub work_order_updates: Vec<String>,
}

// ==========================================
// BatchApi
// ==========================================
pub struct BatchApi {
    manager: Arc<BatchManager>,
}

impl BatchApi {
    pub fn new(manager: Arc<BatchManager>) -> Self {
        Self { manager }
    }

    pub fn create_batch(
        &self,
        session: Option<&ActorContext>,
        request: CreateBatchRequestDto,
    ) -> ApiResult<BatchCreation> {
        let actor = session.ok_or(ApiError::Unauthorized)?;
        require_id("autoclaveId", &request.autoclave_id)?;
        require_id("recipeId", &request.recipe_id)?;

        let req = CreateBatchRequest {
            autoclave_id: request.autoclave_id.trim().to_string(),
            recipe_id: request.recipe_id.trim().to_string(),
            planned_window: PlannedWindow::new(request.planned_start, request.planned_end),
            work_order_ids: request
                .work_order_ids
                .iter()
                .map(|id| id.trim().to_string())
                .collect(),
        };
        Ok(self.manager.create(actor, &req)?)
    }

    /// 推进批次状态
    ///
    /// # 错误
    /// - ValidationError: 非法状态转换 / 缺少扫码 / 扫码工单不是成员 / 成员状态不符
    /// - Conflict: 事务竞争
    pub fn advance_batch(
        &self,
        session: Option<&ActorContext>,
        request: AdvanceBatchRequest,
    ) -> ApiResult<AdvanceBatchResponse> {
        let actor = session.ok_or(ApiError::Unauthorized)?;
        require_id("batchId", &request.batch_id)?;

        let advance = self.manager.advance(
            actor,
            request.batch_id.trim(),
            request.target_status,
            request.scanned_work_order_id.as_deref(),
        )?;
        Ok(AdvanceBatchResponse {
            batch: advance.batch,
            message: advance.message,
            work_order_updates: advance.work_order_updates,
        })
    }

    pub fn remove_batch_member(
        &self,
        session: Option<&ActorContext>,
        batch_id: &str,
        work_order_id: &str,
    ) -> ApiResult<MemberRemoval> {
        let actor = session.ok_or(ApiError::Unauthorized)?;
        require_id("batchId", batch_id)?;
        require_id("workOrderId", work_order_id)?;
        Ok(self.manager.remove_member(actor, batch_id.trim(), work_order_id.trim())?)
    }

    pub fn find_batch_by_work_order(&self, work_order_id: &str) -> ApiResult<Option<BatchDetail>> {
        require_id("workOrderId", work_order_id)?;
        Ok(self.manager.find_by_work_order(work_order_id.trim())?)
    }

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<BatchDetail> {
        require_id("batchId", batch_id)?;
        Ok(self.manager.get(batch_id.trim())?)
    }
}
