//! Protocol layer tests — event wire format, enum strings, patch bodies.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use nexus_protocol::*;
    use serde_json::json;

    fn sample_task() -> Task {
        Task {
            id: 7,
            title: "Ship the beta".into(),
            description: Some("Cut a release branch".into()),
            status: TaskStatus::InProgress,
            priority: TaskPriority::P1,
            workspace_id: 42,
            assignee_id: Some(3),
            due_date: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event wire format
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn created_event_wire_format() {
        let event = TaskEvent::Created {
            task: sample_task(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TASK_CREATED");
        assert_eq!(json["task"]["id"], 7);
        assert_eq!(json["task"]["workspace_id"], 42);
        assert_eq!(json["task"]["status"], "IN_PROGRESS");
        assert_eq!(json["task"]["priority"], "P1");
        assert!(json.get("task_id").is_none());
    }

    #[test]
    fn updated_event_wire_format() {
        let event = TaskEvent::Updated {
            task: sample_task(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TASK_UPDATED");
        assert_eq!(json["task"]["title"], "Ship the beta");
    }

    #[test]
    fn deleted_event_wire_format() {
        let event = TaskEvent::Deleted { task_id: 99 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TASK_DELETED");
        assert_eq!(json["task_id"], 99);
        assert!(json.get("task").is_none());
    }

    #[test]
    fn event_roundtrip() {
        let event = TaskEvent::Created {
            task: sample_task(),
        };
        let wire = serde_json::to_string(&event).unwrap();
        let parsed: TaskEvent = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), "TASK_CREATED");
    }

    #[test]
    fn event_kinds() {
        assert_eq!(
            TaskEvent::Created { task: sample_task() }.kind(),
            "TASK_CREATED"
        );
        assert_eq!(
            TaskEvent::Updated { task: sample_task() }.kind(),
            "TASK_UPDATED"
        );
        assert_eq!(TaskEvent::Deleted { task_id: 1 }.kind(), "TASK_DELETED");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Enum strings
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn status_serde_strings() {
        assert_eq!(serde_json::to_value(TaskStatus::Backlog).unwrap(), json!("BACKLOG"));
        assert_eq!(serde_json::to_value(TaskStatus::Todo).unwrap(), json!("TODO"));
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("IN_PROGRESS")
        );
        assert_eq!(serde_json::to_value(TaskStatus::Done).unwrap(), json!("DONE"));

        let status: TaskStatus = serde_json::from_value(json!("IN_PROGRESS")).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }

    #[test]
    fn status_column_roundtrip() {
        for status in [
            TaskStatus::Backlog,
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Done,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("SHIPPED".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn priority_ordering_most_urgent_first() {
        assert!(TaskPriority::P0 < TaskPriority::P1);
        assert!(TaskPriority::P1 < TaskPriority::P2);
        assert!(TaskPriority::P2 < TaskPriority::P3);
    }

    #[test]
    fn defaults_match_api_contract() {
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
        assert_eq!(TaskPriority::default(), TaskPriority::P2);
        assert_eq!(WorkspaceRole::default(), WorkspaceRole::Member);
    }

    #[test]
    fn workspace_kind_uses_type_field() {
        let workspace = Workspace {
            id: 1,
            name: "Engineering".into(),
            kind: WorkspaceKind::Team,
            owner_id: 5,
        };
        let json = serde_json::to_value(&workspace).unwrap();
        assert_eq!(json["type"], "TEAM");
        assert!(json.get("kind").is_none());

        let parsed: Workspace =
            serde_json::from_value(json!({"id": 2, "name": "p", "type": "PERSONAL", "owner_id": 5}))
                .unwrap();
        assert_eq!(parsed.kind, WorkspaceKind::Personal);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Role gating
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn require_role_ranks() {
        let admin = Membership {
            workspace_id: 1,
            user_id: 1,
            role: WorkspaceRole::Admin,
        };
        let viewer = Membership {
            workspace_id: 1,
            user_id: 2,
            role: WorkspaceRole::Viewer,
        };

        assert!(admin.require_role(WorkspaceRole::Admin).is_ok());
        assert!(admin.require_role(WorkspaceRole::Viewer).is_ok());
        assert!(viewer.require_role(WorkspaceRole::Viewer).is_ok());
        assert_eq!(
            viewer.require_role(WorkspaceRole::Admin),
            Err(AccessError::InsufficientRole {
                required: WorkspaceRole::Admin
            })
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Patch bodies — absent vs explicit null
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn patch_absent_field_is_unchanged() {
        let patch: TaskPatch = serde_json::from_value(json!({"title": "New title"})).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert!(patch.assignee_id.is_none());

        let mut task = sample_task();
        patch.apply(&mut task);
        assert_eq!(task.title, "New title");
        assert_eq!(task.assignee_id, Some(3));
    }

    #[test]
    fn patch_explicit_null_clears() {
        let patch: TaskPatch =
            serde_json::from_value(json!({"assignee_id": null, "description": null})).unwrap();
        assert_eq!(patch.assignee_id, Some(None));
        assert_eq!(patch.description, Some(None));

        let mut task = sample_task();
        patch.apply(&mut task);
        assert_eq!(task.assignee_id, None);
        assert_eq!(task.description, None);
    }

    #[test]
    fn patch_value_replaces() {
        let patch: TaskPatch =
            serde_json::from_value(json!({"assignee_id": 12, "status": "DONE"})).unwrap();
        let mut task = sample_task();
        patch.apply(&mut task);
        assert_eq!(task.assignee_id, Some(12));
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn empty_patch_is_empty() {
        let patch: TaskPatch = serde_json::from_value(json!({})).unwrap();
        assert!(patch.is_empty());
        let mut task = sample_task();
        let before = task.clone();
        patch.apply(&mut task);
        assert_eq!(task, before);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Errors and misc wire details
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn access_error_messages() {
        assert_eq!(
            AccessError::Unauthenticated.to_string(),
            "could not validate credentials"
        );
        assert_eq!(
            AccessError::NotAMember.to_string(),
            "not a member of this workspace"
        );
        assert_eq!(
            AccessError::InsufficientRole {
                required: WorkspaceRole::Admin
            }
            .to_string(),
            "requires the ADMIN role"
        );
    }

    #[test]
    fn policy_violation_close_code() {
        assert_eq!(POLICY_VIOLATION, 1008);
    }

    #[test]
    fn token_response_shape() {
        let json = serde_json::to_value(TokenResponse::bearer("abc".into())).unwrap();
        assert_eq!(json["access_token"], "abc");
        assert_eq!(json["token_type"], "bearer");
    }

    #[test]
    fn task_with_workspace_flattens() {
        let json = serde_json::to_value(TaskWithWorkspace {
            task: sample_task(),
            workspace_name: "Engineering".into(),
        })
        .unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["workspace_name"], "Engineering");
        assert!(json.get("task").is_none());
    }
}
