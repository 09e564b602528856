use super::state::AppState;
use crate::auth::AuthConfig;
use crate::clock::ManualClock;
use crate::db::init_pool;
use crate::schema::users;
use crate::tables::{NewUser, User};
use diesel::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SECRET: &[u8] = b"unit-test-secret";

/// A fresh database file per test. Keep the `TempDir` alive for the test's
/// duration; dropping it removes the database.
pub fn setup_test_state() -> (AppState, Arc<ManualClock>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = dir.path().join("taskflow.db");
    let pool = init_pool(database_url.to_str().expect("temp path is UTF-8"))
        .expect("Failed to create pool.");

    let clock = Arc::new(ManualClock::default());
    let state = AppState::new(pool, AuthConfig::new(TEST_SECRET, false), clock.clone());
    (state, clock, dir)
}

/// Inserts a user directly, skipping password hashing.
pub fn insert_user(state: &AppState, username: &str) -> User {
    let mut conn = state.pool.get().expect("Failed to get connection");
    diesel::insert_into(users::table)
        .values(&NewUser {
            email: &format!("{username}@example.com"),
            username,
            password_hash: "$argon2id$unused",
            created_at: state.now(),
        })
        .get_result(&mut conn)
        .expect("Failed to insert user")
}
