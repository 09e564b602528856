use super::auth::AuthUser;
use super::error::{ApiError, Validator};
use super::owned::{fetch_owned, remove_owned};
use super::state::AppState;
use crate::tables::{NewTask, Task, TaskChanges};
use crate::TASKS_API;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTaskRequest {
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: i32,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TASKS_API}").as_str(),
            get(list_tasks).post(create_task),
        )
        .route(
            format!("/{TASKS_API}/:id").as_str(),
            get(get_task).put(update_task).delete(delete_task),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Task>>, ApiError> {
    use crate::schema::tasks::dsl::*;

    let mut conn = state.pool.get()?;

    let results = tasks
        .filter(user_id.eq(user.id))
        .order((created_at.desc(), id.desc()))
        .load::<Task>(&mut conn)?;

    Ok(Json(results))
}

async fn get_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<Json<Task>, ApiError> {
    let mut conn = state.pool.get()?;
    Ok(Json(fetch_owned::<Task>(&mut conn, user.id, task_id)?))
}

async fn create_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    use crate::schema::tasks;

    let title = payload.title.trim();
    Validator::new()
        .check(!title.is_empty(), "title", "Task title is required")
        .finish()?;

    let mut conn = state.pool.get()?;

    let task = diesel::insert_into(tasks::table)
        .values(&NewTask {
            title,
            completed: false,
            user_id: user.id,
            created_at: state.now(),
        })
        .get_result::<Task>(&mut conn)?;

    debug!("User {} created task {}", user.id, task.id);
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    use crate::schema::tasks;

    let changes = TaskChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        completed: payload.completed,
    };
    Validator::new()
        .check(
            changes.title.as_deref().map_or(true, |t| !t.is_empty()),
            "title",
            "Task title cannot be empty",
        )
        .finish()?;

    let mut conn = state.pool.get()?;
    let existing = fetch_owned::<Task>(&mut conn, user.id, task_id)?;
    if changes.is_empty() {
        return Ok(Json(existing));
    }

    let task = diesel::update(tasks::table.find(existing.id))
        .set(&changes)
        .get_result::<Task>(&mut conn)?;

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut conn = state.pool.get()?;
    remove_owned::<Task>(&mut conn, user.id, task_id)?;

    Ok(Json(DeleteResponse {
        message: "Task deleted successfully".to_string(),
        id: task_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{insert_user, setup_test_state};

    #[tokio::test]
    async fn test_task_crud() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        // Test create
        let create_response = create_task(
            State(state.clone()),
            AuthUser(user.clone()),
            Json(CreateTaskRequest {
                title: "  Test task  ".to_string(),
            }),
        )
        .await
        .expect("Failed to create task");

        assert_eq!(create_response.0, StatusCode::CREATED);
        let task_id = create_response.1 .0.id;
        assert_eq!(create_response.1 .0.title, "Test task");

        // Test get
        let get_response = get_task(State(state.clone()), AuthUser(user.clone()), Path(task_id))
            .await
            .expect("Failed to get task");
        assert!(!get_response.0.completed);

        // Test update
        let update_response = update_task(
            State(state.clone()),
            AuthUser(user.clone()),
            Path(task_id),
            Json(UpdateTaskRequest {
                title: None,
                completed: Some(true),
            }),
        )
        .await
        .expect("Failed to update task");
        assert_eq!(update_response.0.title, "Test task");
        assert!(update_response.0.completed);

        // Test delete
        let delete_response =
            delete_task(State(state.clone()), AuthUser(user.clone()), Path(task_id))
                .await
                .expect("Failed to delete task");
        assert_eq!(delete_response.0.id, task_id);

        // Verify deletion
        let get_result = get_task(State(state), AuthUser(user), Path(task_id)).await;
        assert!(matches!(get_result, Err(ApiError::NotFound("Task"))));
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let result = create_task(
            State(state),
            AuthUser(user),
            Json(CreateTaskRequest {
                title: "   ".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_update_returns_task_unchanged() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let (_, Json(task)) = create_task(
            State(state.clone()),
            AuthUser(user.clone()),
            Json(CreateTaskRequest {
                title: "Stay the same".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(updated) = update_task(
            State(state),
            AuthUser(user),
            Path(task.id),
            Json(UpdateTaskRequest::default()),
        )
        .await
        .unwrap();

        assert_eq!(updated, task);
    }
}
