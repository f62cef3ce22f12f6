// ==========================================
// 生产执行系统 - 部门内动作合法性校验
// ==========================================
// 职责: 根据工单状态 + 部门内最后一条状态事件计算合法动作
// 红线: 纯函数,不访问数据库,不产生副作用
// 规则:
//   无事件/仅 ASSIGNED → ENTRY
//   ENTRY / RESUME      → EXIT, PAUSE
//   PAUSE               → RESUME
//   EXIT                → (无)
//   NOTE 任何时候都合法,且不参与“最后事件”判定
//   UNASSIGNED (出批恢复) 之前的事件不再参与判定
// ==========================================

use crate::domain::production_event::ProductionEvent;
use crate::domain::types::{DepartmentType, EventKind, WorkOrderStatus};
use chrono::NaiveDateTime;
use thiserror::Error;

/// 给定最后一条状态事件时,可继续发生的状态事件
fn next_state_events(last: Option<EventKind>) -> &'static [EventKind] {
    match last {
        None => &[EventKind::Entry],
        Some(EventKind::Entry) | Some(EventKind::Resume) => &[EventKind::Exit, EventKind::Pause],
        Some(EventKind::Pause) => &[EventKind::Resume],
        Some(EventKind::Exit) => &[],
        // 非状态事件不会被记为“最后事件”
        Some(EventKind::Note) | Some(EventKind::Assigned) | Some(EventKind::Unassigned) => &[EventKind::Entry],
    }
}

/// 计算合法动作
///
/// # 参数
/// - `status`: 工单当前状态
/// - `department_type`: 目标部门类型
/// - `last_state_event`: 该工单在目标部门内最后一条状态事件（忽略 NOTE/ASSIGNED）
///
/// # 返回
/// 合法动作列表,NOTE 恒在末尾
pub fn legal_actions(
    status: WorkOrderStatus,
    department_type: DepartmentType,
    last_state_event: Option<EventKind>,
) -> Vec<EventKind> {
    let blocked = status.is_terminal()
        || status == WorkOrderStatus::DepartmentCompleted(department_type);

    let mut actions = Vec::with_capacity(3);
    if !blocked {
        actions.extend_from_slice(next_state_events(last_state_event));
    }
    actions.push(EventKind::Note);
    actions
}

// ==========================================
// IntegrityViolation - 事件序列不一致
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("事件序列第{position}条 {kind} 不允许出现在 {previous:?} 之后")]
pub struct IntegrityViolation {
    pub position: usize,
    pub kind: EventKind,
    pub previous: Option<EventKind>,
}

/// 重放部门内事件序列,返回最后一条状态事件
///
/// 只上报,不修复。序列来自单一部门,按 event_id 排序。
pub fn replay(kinds: &[EventKind]) -> Result<Option<EventKind>, IntegrityViolation> {
    let mut last: Option<EventKind> = None;
    for (position, kind) in kinds.iter().copied().enumerate() {
        if kind.ends_membership() {
            last = None;
            continue;
        }
        if !kind.is_state_bearing() {
            continue;
        }
        if !next_state_events(last).contains(&kind) {
            return Err(IntegrityViolation {
                position,
                kind,
                previous: last,
            });
        }
        last = Some(kind);
    }
    Ok(last)
}

/// replay 的事件版本,错误信息中附带 event_id
pub fn replay_events(events: &[ProductionEvent]) -> Result<Option<EventKind>, String> {
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    replay(&kinds).map_err(|v| {
        let event_id = events.get(v.position).map(|e| e.event_id).unwrap_or_default();
        let work_order_id = events
            .first()
            .map(|e| e.work_order_id.as_str())
            .unwrap_or_default();
        format!("工单{} 事件#{}: {}", work_order_id, event_id, v)
    })
}

/// 累计工作时长（分钟）: 扣除暂停区间; 仍在进行中的区间截止到 `until`
///
/// 只统计最后一次 UNASSIGNED 之后的区间
pub fn active_duration_minutes(events: &[(EventKind, NaiveDateTime)], until: NaiveDateTime) -> i64 {
    let mut total = 0i64;
    let mut open_since: Option<NaiveDateTime> = None;

    for (kind, ts) in events {
        match kind {
            EventKind::Entry | EventKind::Resume => {
                if open_since.is_none() {
                    open_since = Some(*ts);
                }
            }
            EventKind::Pause | EventKind::Exit => {
                if let Some(start) = open_since.take() {
                    total += (*ts - start).num_minutes().max(0);
                }
            }
            EventKind::Unassigned => {
                total = 0;
                open_since = None;
            }
            EventKind::Note | EventKind::Assigned => {}
        }
    }

    if let Some(start) = open_since {
        total += (until - start).num_minutes().max(0);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use EventKind::*;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_actions_follow_last_state_event() {
        let status = WorkOrderStatus::InDepartment(DepartmentType::Ndi);
        let dept = DepartmentType::Ndi;

        assert_eq!(legal_actions(status, dept, None), vec![Entry, Note]);
        assert_eq!(legal_actions(status, dept, Some(Entry)), vec![Exit, Pause, Note]);
        assert_eq!(legal_actions(status, dept, Some(Resume)), vec![Exit, Pause, Note]);
        assert_eq!(legal_actions(status, dept, Some(Pause)), vec![Resume, Note]);
        assert_eq!(legal_actions(status, dept, Some(Exit)), vec![Note]);
    }

    #[test]
    fn test_terminal_and_completed_here_only_allow_note() {
        for status in [
            WorkOrderStatus::Completed,
            WorkOrderStatus::OnHold,
            WorkOrderStatus::Cancelled,
            WorkOrderStatus::DepartmentCompleted(DepartmentType::Painting),
        ] {
            assert_eq!(
                legal_actions(status, DepartmentType::Painting, None),
                vec![Note],
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_completed_elsewhere_allows_entry() {
        let status = WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom);
        assert_eq!(
            legal_actions(status, DepartmentType::Autoclave, None),
            vec![Entry, Note]
        );
    }

    #[test]
    fn test_replay_ignores_notes_and_assignment() {
        assert_eq!(replay(&[]), Ok(None));
        assert_eq!(replay(&[Assigned, Note]), Ok(None));
        assert_eq!(
            replay(&[Assigned, Entry, Note, Pause, Note, Resume, Exit, Note]),
            Ok(Some(Exit))
        );
    }

    #[test]
    fn test_unassigned_starts_fresh_span() {
        // 固化中被移出批次,随后重新入批
        let history = [Assigned, Entry, Exit, Note, Unassigned];
        assert_eq!(replay(&history), Ok(None));
        assert_eq!(
            legal_actions(
                WorkOrderStatus::DepartmentCompleted(DepartmentType::Cleanroom),
                DepartmentType::Autoclave,
                replay(&history).unwrap()
            ),
            vec![Entry, Note]
        );
        assert_eq!(
            replay(&[Assigned, Entry, Exit, Unassigned, Assigned, Entry]),
            Ok(Some(Entry))
        );
        // 标记之前的序列照常校验
        assert!(replay(&[Entry, Entry, Unassigned]).is_err());
    }

    #[test]
    fn test_replay_reports_first_inconsistency() {
        let err = replay(&[Entry, Resume]).unwrap_err();
        assert_eq!(err.position, 1);
        assert_eq!(err.kind, Resume);
        assert_eq!(err.previous, Some(Entry));

        assert!(replay(&[Exit]).is_err());
        assert!(replay(&[Entry, Exit, Entry]).is_err());
        assert!(replay(&[Entry, Entry]).is_err());
        assert!(replay(&[Entry, Pause, Exit]).is_err());
        assert!(replay(&[Pause]).is_err());
    }

    #[test]
    fn test_active_duration_excludes_pauses() {
        let events = [
            (Entry, ts(8, 0)),
            (Pause, ts(9, 0)),
            (Note, ts(9, 10)),
            (Resume, ts(9, 30)),
            (Exit, ts(10, 0)),
        ];
        assert_eq!(active_duration_minutes(&events, ts(12, 0)), 90);

        let open = [(Entry, ts(8, 0)), (Pause, ts(8, 20)), (Resume, ts(8, 40))];
        assert_eq!(active_duration_minutes(&open, ts(9, 0)), 40);

        assert_eq!(active_duration_minutes(&[], ts(9, 0)), 0);

        let recured = [
            (Entry, ts(8, 0)),
            (Exit, ts(9, 0)),
            (Unassigned, ts(9, 0)),
            (Entry, ts(11, 0)),
        ];
        assert_eq!(active_duration_minutes(&recured, ts(11, 45)), 45);
    }
}
