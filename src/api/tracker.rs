use super::auth::AuthUser;
use super::error::{ApiError, Validator};
use super::owned::{fetch_owned, remove_owned};
use super::state::AppState;
use super::tasks::DeleteResponse;
use crate::schema::{sessions, trackers};
use crate::tables::{NewSession, NewTracker, Session, Tracker, TrackerChanges};
use crate::tracker::{self as accounting, OpenSession};
use crate::TRACKER_API;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackerRequest {
    #[serde(default)]
    pub title: String,
    pub target_duration: Option<i64>,
    pub weekly_goal: Option<i64>,
}

/// Absent fields are left alone. A goal sent as `null` is cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrackerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_duration: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub weekly_goal: Option<Option<i64>>,
}

// Only called for keys that are present, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// A tracker as clients see it: the stored row plus figures derived at
/// response time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerResponse {
    pub id: i32,
    pub title: String,
    pub total_time: i64,
    pub target_duration: Option<i64>,
    pub weekly_goal: Option<i64>,
    pub is_running: bool,
    pub start_time: Option<NaiveDateTime>,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
    pub elapsed_time: i64,
    pub target_progress: Option<u8>,
    pub weekly_progress: Option<u8>,
    pub sessions: Vec<Session>,
}

impl TrackerResponse {
    pub fn new(tracker: Tracker, sessions: Vec<Session>, now: NaiveDateTime) -> Self {
        Self {
            elapsed_time: accounting::elapsed_seconds(
                tracker.total_time,
                tracker.is_running,
                tracker.start_time,
                now,
            ),
            target_progress: accounting::progress_percent(
                tracker.total_time,
                tracker.target_duration,
            ),
            weekly_progress: accounting::progress_percent(tracker.total_time, tracker.weekly_goal),
            id: tracker.id,
            title: tracker.title,
            total_time: tracker.total_time,
            target_duration: tracker.target_duration,
            weekly_goal: tracker.weekly_goal,
            is_running: tracker.is_running,
            start_time: tracker.start_time,
            user_id: tracker.user_id,
            created_at: tracker.created_at,
            sessions,
        }
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TRACKER_API}").as_str(),
            get(list_trackers).post(create_tracker),
        )
        .route(
            format!("/{TRACKER_API}/:id").as_str(),
            get(get_tracker).put(update_tracker).delete(delete_tracker),
        )
        .route(
            format!("/{TRACKER_API}/:id/start").as_str(),
            patch(start_tracker),
        )
        .route(
            format!("/{TRACKER_API}/:id/stop").as_str(),
            patch(stop_tracker),
        )
        .route(
            format!("/{TRACKER_API}/:id/sync").as_str(),
            post(sync_tracker),
        )
}

fn check_goal(validator: &mut Validator, goal: Option<i64>, field: &str) {
    validator.check(
        goal.map_or(true, |seconds| seconds > 0),
        field,
        "Must be a positive number of seconds",
    );
}

/// The open session of a running tracker. A running tracker without one
/// means the rows were written outside this API.
fn running_session(
    conn: &mut SqliteConnection,
    tracker: &Tracker,
) -> Result<Option<(Session, OpenSession)>, ApiError> {
    if !tracker.is_running {
        return Ok(None);
    }

    let session = sessions::table
        .filter(sessions::tracker_id.eq(tracker.id))
        .filter(sessions::end_time.is_null())
        .order(sessions::id.desc())
        .first::<Session>(conn)
        .optional()?
        .ok_or_else(|| {
            ApiError::internal(format!(
                "Tracker {} is running without an open session",
                tracker.id
            ))
        })?;

    let open = OpenSession {
        anchor: session.start_time,
        duration: session.duration.unwrap_or(0),
    };
    Ok(Some((session, open)))
}

fn respond(
    conn: &mut SqliteConnection,
    tracker: Tracker,
    now: NaiveDateTime,
) -> Result<TrackerResponse, ApiError> {
    let history = Session::belonging_to(&tracker)
        .order(sessions::id.asc())
        .load::<Session>(conn)?;
    Ok(TrackerResponse::new(tracker, history, now))
}

async fn list_trackers(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<TrackerResponse>>, ApiError> {
    let now = state.now();
    let mut conn = state.pool.get()?;

    let owned = trackers::table
        .filter(trackers::user_id.eq(user.id))
        .order((trackers::created_at.asc(), trackers::id.asc()))
        .load::<Tracker>(&mut conn)?;

    let ids: Vec<i32> = owned.iter().map(|t| t.id).collect();
    let mut by_tracker: HashMap<i32, Vec<Session>> = HashMap::new();
    for session in sessions::table
        .filter(sessions::tracker_id.eq_any(ids))
        .order(sessions::id.asc())
        .load::<Session>(&mut conn)?
    {
        by_tracker.entry(session.tracker_id).or_default().push(session);
    }

    let response = owned
        .into_iter()
        .map(|tracker| {
            let history = by_tracker.remove(&tracker.id).unwrap_or_default();
            TrackerResponse::new(tracker, history, now)
        })
        .collect();

    Ok(Json(response))
}

async fn get_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let now = state.now();
    let mut conn = state.pool.get()?;
    let tracker = fetch_owned::<Tracker>(&mut conn, user.id, tracker_id)?;
    Ok(Json(respond(&mut conn, tracker, now)?))
}

async fn create_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateTrackerRequest>,
) -> Result<(StatusCode, Json<TrackerResponse>), ApiError> {
    let title = payload.title.trim();
    let mut validator = Validator::new();
    validator.check(!title.is_empty(), "title", "Tracker title is required");
    check_goal(&mut validator, payload.target_duration, "targetDuration");
    check_goal(&mut validator, payload.weekly_goal, "weeklyGoal");
    validator.finish()?;

    let now = state.now();
    let mut conn = state.pool.get()?;

    let tracker = diesel::insert_into(trackers::table)
        .values(&NewTracker {
            title,
            target_duration: payload.target_duration,
            weekly_goal: payload.weekly_goal,
            user_id: user.id,
            created_at: now,
        })
        .get_result::<Tracker>(&mut conn)?;

    info!("User {} created tracker {}", user.id, tracker.id);
    Ok((
        StatusCode::CREATED,
        Json(TrackerResponse::new(tracker, Vec::new(), now)),
    ))
}

async fn update_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
    Json(payload): Json<UpdateTrackerRequest>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let changes = TrackerChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        target_duration: payload.target_duration,
        weekly_goal: payload.weekly_goal,
    };

    let mut validator = Validator::new();
    validator.check(
        changes.title.as_deref().map_or(true, |t| !t.is_empty()),
        "title",
        "Tracker title cannot be empty",
    );
    check_goal(&mut validator, changes.target_duration.flatten(), "targetDuration");
    check_goal(&mut validator, changes.weekly_goal.flatten(), "weeklyGoal");
    validator.finish()?;

    let now = state.now();
    let mut conn = state.pool.get()?;
    let existing = fetch_owned::<Tracker>(&mut conn, user.id, tracker_id)?;

    let tracker = if changes.is_empty() {
        existing
    } else {
        diesel::update(trackers::table.find(existing.id))
            .set(&changes)
            .get_result::<Tracker>(&mut conn)?
    };

    Ok(Json(respond(&mut conn, tracker, now)?))
}

async fn delete_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut conn = state.pool.get()?;

    conn.immediate_transaction::<_, ApiError, _>(|conn| {
        let tracker = fetch_owned::<Tracker>(conn, user.id, tracker_id)?;
        diesel::delete(sessions::table.filter(sessions::tracker_id.eq(tracker.id)))
            .execute(conn)?;
        remove_owned::<Tracker>(conn, user.id, tracker.id)
    })?;

    info!("User {} deleted tracker {}", user.id, tracker_id);
    Ok(Json(DeleteResponse {
        message: "Tracker deleted successfully".to_string(),
        id: tracker_id,
    }))
}

async fn start_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let now = state.now();
    let mut conn = state.pool.get()?;

    let tracker = conn.immediate_transaction::<_, ApiError, _>(|conn| {
        let tracker = fetch_owned::<Tracker>(conn, user.id, tracker_id)?;
        let running = running_session(conn, &tracker)?;
        let anchor = accounting::start(running.as_ref().map(|(_, open)| open), now)?;

        diesel::insert_into(sessions::table)
            .values(&NewSession {
                tracker_id: tracker.id,
                start_time: anchor,
            })
            .execute(conn)?;

        let started = diesel::update(trackers::table.find(tracker.id))
            .set((
                trackers::is_running.eq(true),
                trackers::start_time.eq(Some(anchor)),
            ))
            .get_result::<Tracker>(conn)?;
        Ok(started)
    })?;

    info!("Tracker {} started", tracker.id);
    Ok(Json(respond(&mut conn, tracker, now)?))
}

async fn stop_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let now = state.now();
    let mut conn = state.pool.get()?;

    let (tracker, seconds) = conn.immediate_transaction::<_, ApiError, _>(|conn| {
        let tracker = fetch_owned::<Tracker>(conn, user.id, tracker_id)?;
        let running = running_session(conn, &tracker)?;
        let stopped =
            accounting::stop(tracker.total_time, running.as_ref().map(|(_, open)| open), now)?;

        if let Some((session, _)) = &running {
            diesel::update(sessions::table.find(session.id))
                .set((
                    sessions::end_time.eq(Some(stopped.end_time)),
                    sessions::duration.eq(Some(stopped.session_duration)),
                ))
                .execute(conn)?;
        }

        let updated = diesel::update(trackers::table.find(tracker.id))
            .set((
                trackers::total_time.eq(stopped.total_time),
                trackers::is_running.eq(false),
                trackers::start_time.eq(None::<NaiveDateTime>),
            ))
            .get_result::<Tracker>(conn)?;
        Ok((updated, stopped.seconds))
    })?;

    info!("Tracker {} stopped after {}s", tracker.id, seconds);
    Ok(Json(respond(&mut conn, tracker, now)?))
}

async fn sync_tracker(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tracker_id): Path<i32>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let now = state.now();
    let mut conn = state.pool.get()?;

    let (tracker, seconds) = conn.immediate_transaction::<_, ApiError, _>(|conn| {
        let tracker = fetch_owned::<Tracker>(conn, user.id, tracker_id)?;
        let running = running_session(conn, &tracker)?;
        let synced =
            accounting::sync(tracker.total_time, running.as_ref().map(|(_, open)| open), now)?;

        if let Some((session, _)) = &running {
            diesel::update(sessions::table.find(session.id))
                .set((
                    sessions::start_time.eq(synced.anchor),
                    sessions::duration.eq(Some(synced.session_duration)),
                ))
                .execute(conn)?;
        }

        let updated = diesel::update(trackers::table.find(tracker.id))
            .set((
                trackers::total_time.eq(synced.total_time),
                trackers::start_time.eq(Some(synced.anchor)),
            ))
            .get_result::<Tracker>(conn)?;
        Ok((updated, synced.seconds))
    })?;

    debug!("Tracker {} synced {}s", tracker.id, seconds);
    Ok(Json(respond(&mut conn, tracker, now)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{insert_user, setup_test_state};
    use crate::tracker::TransitionError;
    use chrono::Duration;

    async fn create(state: &AppState, user: &crate::tables::User, title: &str) -> TrackerResponse {
        let (_, Json(tracker)) = create_tracker(
            State(state.clone()),
            AuthUser(user.clone()),
            Json(CreateTrackerRequest {
                title: title.to_string(),
                target_duration: Some(1800),
                weekly_goal: None,
            }),
        )
        .await
        .expect("Failed to create tracker");
        tracker
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");
        let tracker = create(&state, &user, "Reading").await;

        start_tracker(State(state.clone()), AuthUser(user.clone()), Path(tracker.id))
            .await
            .expect("first start succeeds");
        let second = start_tracker(State(state), AuthUser(user), Path(tracker.id)).await;

        assert!(matches!(
            second,
            Err(ApiError::InvalidState(TransitionError::AlreadyRunning))
        ));
    }

    #[tokio::test]
    async fn test_sync_folds_time_without_closing_session() {
        let (state, clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");
        let tracker = create(&state, &user, "Reading").await;

        start_tracker(State(state.clone()), AuthUser(user.clone()), Path(tracker.id))
            .await
            .unwrap();
        clock.advance(Duration::milliseconds(61_500));

        let Json(synced) = sync_tracker(State(state.clone()), AuthUser(user.clone()), Path(tracker.id))
            .await
            .unwrap();

        assert!(synced.is_running);
        assert_eq!(synced.total_time, 61);
        assert_eq!(synced.elapsed_time, 61);
        assert_eq!(synced.sessions.len(), 1);
        assert!(synced.sessions[0].end_time.is_none());
        assert_eq!(synced.sessions[0].duration, Some(61));
        assert_eq!(synced.start_time, Some(synced.sessions[0].start_time));
    }

    #[tokio::test]
    async fn test_update_leaves_accounting_alone() {
        let (state, clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");
        let tracker = create(&state, &user, "Reading").await;

        start_tracker(State(state.clone()), AuthUser(user.clone()), Path(tracker.id))
            .await
            .unwrap();
        clock.advance(Duration::seconds(30));

        let Json(updated) = update_tracker(
            State(state),
            AuthUser(user),
            Path(tracker.id),
            Json(UpdateTrackerRequest {
                title: Some("Deep reading".to_string()),
                weekly_goal: Some(Some(3600)),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Deep reading");
        assert_eq!(updated.weekly_goal, Some(3600));
        assert_eq!(updated.target_duration, Some(1800));
        assert!(updated.is_running);
        assert_eq!(updated.total_time, 0);
        assert_eq!(updated.elapsed_time, 30);
    }

    #[test]
    fn test_update_request_tells_null_from_absent() {
        let absent: UpdateTrackerRequest = serde_json::from_str(r#"{"title":"Run"}"#).unwrap();
        assert_eq!(absent.target_duration, None);
        assert_eq!(absent.weekly_goal, None);

        let cleared: UpdateTrackerRequest =
            serde_json::from_str(r#"{"targetDuration":null,"weeklyGoal":600}"#).unwrap();
        assert_eq!(cleared.target_duration, Some(None));
        assert_eq!(cleared.weekly_goal, Some(Some(600)));
    }

    #[tokio::test]
    async fn test_null_goal_clears_it() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");
        let tracker = create(&state, &user, "Reading").await;
        assert_eq!(tracker.target_duration, Some(1800));

        let Json(updated) = update_tracker(
            State(state),
            AuthUser(user),
            Path(tracker.id),
            Json(UpdateTrackerRequest {
                target_duration: Some(None),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.target_duration, None);
        assert_eq!(updated.target_progress, None);
        assert_eq!(updated.title, "Reading");
    }

    #[tokio::test]
    async fn test_non_positive_goal_is_rejected() {
        let (state, _clock, _dir) = setup_test_state();
        let user = insert_user(&state, "ada");

        let result = create_tracker(
            State(state),
            AuthUser(user),
            Json(CreateTrackerRequest {
                title: "Piano".to_string(),
                target_duration: Some(0),
                weekly_goal: Some(-60),
            }),
        )
        .await;

        match result {
            Err(ApiError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
