//! Tasks.

use nexus_protocol::{
    Task, TaskCreate, TaskId, TaskPatch, TaskStatus, TaskWithWorkspace, UserId, WorkspaceId,
};
use tokio_postgres::Row;

use crate::{Store, StoreError};

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, workspace_id, assignee_id, \
     due_date, created_at, updated_at";

fn task_from_row(row: &Row) -> Result<Task, StoreError> {
    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get::<_, &str>("status").parse()?,
        priority: row.get::<_, &str>("priority").parse()?,
        workspace_id: row.get("workspace_id"),
        assignee_id: row.get("assignee_id"),
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl Store {
    pub async fn create_task(
        &self,
        workspace_id: WorkspaceId,
        params: &TaskCreate,
    ) -> Result<Task, StoreError> {
        let client = self.client().lock().await;
        let status = params.status.as_str();
        let priority = params.priority.as_str();
        let sql = format!(
            "INSERT INTO tasks (title, description, status, priority, \
             workspace_id, assignee_id, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TASK_COLUMNS}"
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[
                    &params.title,
                    &params.description,
                    &status,
                    &priority,
                    &workspace_id,
                    &params.assignee_id,
                    &params.due_date,
                ],
            )
            .await?;
        task_from_row(&row)
    }

    pub async fn task_by_id(&self, task_id: TaskId) -> Result<Option<Task>, StoreError> {
        let client = self.client().lock().await;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        let row = client.query_opt(sql.as_str(), &[&task_id]).await?;
        row.map(|row| task_from_row(&row)).transpose()
    }

    /// Apply a partial update under a row lock and return the new snapshot.
    /// `None` when the task does not exist.
    pub async fn update_task(
        &self,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let mut client = self.client().lock().await;
        let tx = client.transaction().await?;

        let select = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE");
        let Some(row) = tx.query_opt(select.as_str(), &[&task_id]).await? else {
            return Ok(None);
        };
        let mut task = task_from_row(&row)?;
        patch.apply(&mut task);

        let status = task.status.as_str();
        let priority = task.priority.as_str();
        let update = format!(
            "UPDATE tasks
             SET title = $1, description = $2, status = $3, priority = $4,
                 due_date = $5, assignee_id = $6, updated_at = now()
             WHERE id = $7
             RETURNING {TASK_COLUMNS}"
        );
        let row = tx
            .query_one(
                update.as_str(),
                &[
                    &task.title,
                    &task.description,
                    &status,
                    &priority,
                    &task.due_date,
                    &task.assignee_id,
                    &task_id,
                ],
            )
            .await?;
        let task = task_from_row(&row)?;
        tx.commit().await?;
        Ok(Some(task))
    }

    /// Returns false when the task did not exist.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<bool, StoreError> {
        let client = self.client().lock().await;
        let deleted = client
            .execute("DELETE FROM tasks WHERE id = $1", &[&task_id])
            .await?;
        Ok(deleted > 0)
    }

    pub async fn tasks_in_workspace(
        &self,
        workspace_id: WorkspaceId,
        status: Option<TaskStatus>,
        assignee_id: Option<UserId>,
    ) -> Result<Vec<Task>, StoreError> {
        let client = self.client().lock().await;
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE workspace_id = $1
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::BIGINT IS NULL OR assignee_id = $3)
             ORDER BY id"
        );
        let rows = client
            .query(sql.as_str(), &[&workspace_id, &status, &assignee_id])
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Tasks assigned to a user across all their workspaces, joined with
    /// the workspace name for the inbox view.
    pub async fn tasks_assigned_to(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TaskWithWorkspace>, StoreError> {
        let client = self.client().lock().await;
        let rows = client
            .query(
                "SELECT t.id, t.title, t.description, t.status, t.priority,
                        t.workspace_id, t.assignee_id, t.due_date, t.created_at,
                        t.updated_at, w.name AS workspace_name
                 FROM tasks t
                 JOIN workspaces w ON w.id = t.workspace_id
                 WHERE t.assignee_id = $1
                 ORDER BY t.id",
                &[&user_id],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(TaskWithWorkspace {
                    task: task_from_row(row)?,
                    workspace_name: row.get("workspace_name"),
                })
            })
            .collect()
    }
}
