// ==========================================
// 对外接口集成测试
// ==========================================
// 职责: 验证 ProductionApi / BatchApi 的会话校验、错误分类与 DTO 形态
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod production_api_test {
    use chrono::{Duration, Utc};
    use mes_workflow::api::{
        ActionMetadataDto, AdvanceBatchRequest, ApiError, CreateBatchRequestDto, PerformActionRequest,
        StatusOverrideRequest,
    };
    use mes_workflow::domain::types::{BatchStatus, DepartmentType, EventKind, WorkOrderStatus};
    use mes_workflow::engine::StatusOverride;

    use crate::test_helpers::*;

    const NDI: DepartmentType = DepartmentType::Ndi;

    fn action(work_order_id: &str, t: DepartmentType, kind: EventKind) -> PerformActionRequest {
        PerformActionRequest {
            work_order_id: work_order_id.to_string(),
            department_id: dept(t),
            action_kind: kind,
            notes: None,
            force_transfer: false,
            metadata: None,
        }
    }

    #[test]
    fn test_missing_session_is_unauthorized() {
        let (_tmp, state) = setup_state();
        insert_work_order(&state, &work_order("WO-1", WorkOrderStatus::InDepartment(NDI)));

        let err = state
            .production_api
            .perform_work_order_action(None, action("WO-1", NDI, EventKind::Entry))
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.to_response().code, "UNAUTHORIZED");

        let err = state
            .batch_api
            .remove_batch_member(None, "batch", "WO-1")
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_perform_action_response_shape() {
        let (_tmp, state) = setup_state();
        insert_work_order(&state, &work_order("WO-2", WorkOrderStatus::InDepartment(NDI)));
        let op = operator_of(NDI);

        let entry = state
            .production_api
            .perform_work_order_action(Some(&op), action("WO-2", NDI, EventKind::Entry))
            .unwrap();
        assert!(entry.success);
        assert_eq!(entry.event.kind, EventKind::Entry);
        assert_eq!(entry.current_status, "IN_NDI");
        assert!(entry.auto_transfer.is_none());

        let mut exit = action("WO-2", NDI, EventKind::Exit);
        exit.metadata = Some(ActionMetadataDto {
            duration: Some(30),
            batch_id: None,
        });
        let response = state
            .production_api
            .perform_work_order_action(Some(&op), exit)
            .unwrap();
        assert_eq!(response.current_status, "IN_NUMERIC_CONTROL");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["event"]["kind"], "EXIT");
        assert_eq!(json["event"]["isAutomatic"], false);
        assert_eq!(json["autoTransfer"]["success"], true);
        assert_eq!(json["autoTransfer"]["nextDepartment"], "DEPT-NUMERIC_CONTROL");
        assert_eq!(json["autoTransfer"]["newStatus"], "IN_NUMERIC_CONTROL");
    }

    #[test]
    fn test_error_classification() {
        let (_tmp, state) = setup_state();
        insert_work_order(&state, &work_order("WO-3", WorkOrderStatus::InDepartment(NDI)));
        let op = operator_of(NDI);

        // 非法动作 → ValidationError + 合法动作
        let err = state
            .production_api
            .perform_work_order_action(Some(&op), action("WO-3", NDI, EventKind::Resume))
            .unwrap_err();
        let response = err.to_response();
        assert_eq!(response.code, "VALIDATION_ERROR");
        assert!(!response.retryable);
        let details = response.details.unwrap();
        assert_eq!(details["currentStatus"], "IN_NDI");
        assert_eq!(details["requested"], "RESUME");
        assert_eq!(details["legalActions"], serde_json::json!(["ENTRY", "NOTE"]));

        // 其他部门操作员 → Forbidden
        let err = state
            .production_api
            .perform_work_order_action(
                Some(&operator_of(DepartmentType::Assembly)),
                action("WO-3", NDI, EventKind::Entry),
            )
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        // 不存在的工单 → NotFound
        let err = state
            .production_api
            .perform_work_order_action(Some(&op), action("WO-404", NDI, EventKind::Entry))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        // 空ID / 负时长 → InvalidInput
        let err = state
            .production_api
            .perform_work_order_action(Some(&op), action("  ", NDI, EventKind::Entry))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let mut negative = action("WO-3", NDI, EventKind::Entry);
        negative.metadata = Some(ActionMetadataDto {
            duration: Some(-5),
            batch_id: None,
        });
        let err = state
            .production_api
            .perform_work_order_action(Some(&op), negative)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        // 历史损坏 → IntegrityError
        insert_work_order(&state, &work_order("WO-4", WorkOrderStatus::InDepartment(NDI)));
        append_raw_event(&state, "WO-4", NDI, EventKind::Pause);
        let err = state
            .production_api
            .perform_work_order_action(Some(&op), action("WO-4", NDI, EventKind::Resume))
            .unwrap_err();
        assert_eq!(err.code(), "INTEGRITY_ERROR");
    }

    #[test]
    fn test_available_actions_does_not_mutate() {
        let (_tmp, state) = setup_state();
        insert_work_order(&state, &work_order("WO-5", WorkOrderStatus::InDepartment(NDI)));
        let op = operator_of(NDI);
        state
            .production_api
            .perform_work_order_action(Some(&op), action("WO-5", NDI, EventKind::Entry))
            .unwrap();

        let events_before = count_rows(&state, "SELECT COUNT(*) FROM production_event");
        let logs_before = count_rows(&state, "SELECT COUNT(*) FROM work_order_status_log");

        let response = state.production_api.available_actions("WO-5", &dept(NDI)).unwrap();
        assert_eq!(response.current_status, "IN_NDI");
        assert_eq!(response.last_event.unwrap().kind, EventKind::Entry);
        assert_eq!(
            response.available_actions,
            vec![EventKind::Exit, EventKind::Pause, EventKind::Note]
        );

        let again = state.production_api.available_actions("WO-5", &dept(NDI)).unwrap();
        assert_eq!(again.available_actions, response.available_actions);
        assert_eq!(count_rows(&state, "SELECT COUNT(*) FROM production_event"), events_before);
        assert_eq!(count_rows(&state, "SELECT COUNT(*) FROM work_order_status_log"), logs_before);
    }

    #[test]
    fn test_status_override_and_timeline() {
        let (_tmp, state) = setup_state();
        insert_work_order(&state, &work_order("WO-6", WorkOrderStatus::InDepartment(NDI)));

        let request = StatusOverrideRequest {
            work_order_id: "WO-6".to_string(),
            operation: StatusOverride::Hold,
            reason: Some("来料复检".to_string()),
        };
        let change = state
            .production_api
            .override_work_order_status(Some(&supervisor()), request.clone())
            .unwrap();
        assert_eq!(change.to_status, WorkOrderStatus::OnHold);

        let err = state
            .production_api
            .override_work_order_status(Some(&operator_of(NDI)), request)
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let timeline = state.production_api.work_order_timeline("WO-6").unwrap();
        assert_eq!(timeline.work_order.status, WorkOrderStatus::OnHold);
        assert_eq!(timeline.status_history.len(), 1);
        assert_eq!(timeline.status_history[0].reason, "HOLD: 来料复检");
    }

    #[test]
    fn test_batch_api_round_trip() {
        let (_tmp, state) = setup_state();
        insert_ready_for_autoclave(&state, &["WO-7", "WO-8"]);
        let sup = supervisor();
        let start = Utc::now().naive_utc() + Duration::hours(2);

        let creation = state
            .batch_api
            .create_batch(
                Some(&sup),
                CreateBatchRequestDto {
                    autoclave_id: AUTOCLAVE_ID.to_string(),
                    recipe_id: RECIPE_ID.to_string(),
                    planned_start: start,
                    planned_end: start + Duration::hours(5),
                    work_order_ids: vec!["WO-7".to_string(), " WO-8 ".to_string()],
                },
            )
            .unwrap();
        let batch_id = creation.batch.batch_id.clone();

        let found = state.batch_api.find_batch_by_work_order("WO-8").unwrap().unwrap();
        assert_eq!(found.batch.batch_id, batch_id);

        let ready = state
            .batch_api
            .advance_batch(
                Some(&sup),
                AdvanceBatchRequest {
                    batch_id: batch_id.clone(),
                    target_status: BatchStatus::Ready,
                    scanned_work_order_id: None,
                },
            )
            .unwrap();
        assert_eq!(ready.batch.status, BatchStatus::Ready);
        assert!(ready.work_order_updates.is_empty());

        // 缺少扫码 → ValidationError
        let err = state
            .batch_api
            .advance_batch(
                Some(&sup),
                AdvanceBatchRequest {
                    batch_id: batch_id.clone(),
                    target_status: BatchStatus::InCure,
                    scanned_work_order_id: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        // 非法转换
        let err = state
            .batch_api
            .advance_batch(
                Some(&sup),
                AdvanceBatchRequest {
                    batch_id: batch_id.clone(),
                    target_status: BatchStatus::Released,
                    scanned_work_order_id: Some("WO-7".to_string()),
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let removal = state
            .batch_api
            .remove_batch_member(Some(&sup), &batch_id, "WO-7")
            .unwrap();
        assert_eq!(
            removal.restored_status,
            Some(WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom))
        );
        assert_eq!(state.batch_api.get_batch(&batch_id).unwrap().items.len(), 1);

        let err = state.batch_api.get_batch("no-such-batch").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_advance_request_deserializes() {
        let raw = r#"{"batchId":"b-1","targetStatus":"IN_CURE","scannedWorkOrderId":"WO-9"}"#;
        let req: AdvanceBatchRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.target_status, BatchStatus::InCure);
        assert_eq!(req.scanned_work_order_id.as_deref(), Some("WO-9"));
    }
}
