//! Ownership-scoped lookups shared by every per-user resource.
//!
//! A record that belongs to someone else is reported exactly like a record
//! that does not exist.

use super::error::ApiError;
use crate::tables::{Note, Task, Tracker};
use diesel::prelude::*;

pub trait OwnedRecord: Sized {
    /// Used in "<KIND> not found" messages.
    const KIND: &'static str;

    fn find_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<Option<Self>>;

    fn delete_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<usize>;
}

pub fn fetch_owned<R: OwnedRecord>(
    conn: &mut SqliteConnection,
    owner_id: i32,
    id: i32,
) -> Result<R, ApiError> {
    R::find_owned(conn, owner_id, id)?.ok_or(ApiError::NotFound(R::KIND))
}

pub fn remove_owned<R: OwnedRecord>(
    conn: &mut SqliteConnection,
    owner_id: i32,
    id: i32,
) -> Result<(), ApiError> {
    match R::delete_owned(conn, owner_id, id)? {
        0 => Err(ApiError::NotFound(R::KIND)),
        _ => Ok(()),
    }
}

impl OwnedRecord for Task {
    const KIND: &'static str = "Task";

    fn find_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<Option<Self>> {
        use crate::schema::tasks;
        tasks::table
            .filter(tasks::id.eq(id))
            .filter(tasks::user_id.eq(owner_id))
            .first::<Task>(conn)
            .optional()
    }

    fn delete_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<usize> {
        use crate::schema::tasks;
        diesel::delete(
            tasks::table
                .filter(tasks::id.eq(id))
                .filter(tasks::user_id.eq(owner_id)),
        )
        .execute(conn)
    }
}

impl OwnedRecord for Note {
    const KIND: &'static str = "Note";

    fn find_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<Option<Self>> {
        use crate::schema::notes;
        notes::table
            .filter(notes::id.eq(id))
            .filter(notes::user_id.eq(owner_id))
            .first::<Note>(conn)
            .optional()
    }

    fn delete_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<usize> {
        use crate::schema::notes;
        diesel::delete(
            notes::table
                .filter(notes::id.eq(id))
                .filter(notes::user_id.eq(owner_id)),
        )
        .execute(conn)
    }
}

impl OwnedRecord for Tracker {
    const KIND: &'static str = "Tracker";

    fn find_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<Option<Self>> {
        use crate::schema::trackers;
        trackers::table
            .filter(trackers::id.eq(id))
            .filter(trackers::user_id.eq(owner_id))
            .first::<Tracker>(conn)
            .optional()
    }

    fn delete_owned(conn: &mut SqliteConnection, owner_id: i32, id: i32) -> QueryResult<usize> {
        use crate::schema::trackers;
        diesel::delete(
            trackers::table
                .filter(trackers::id.eq(id))
                .filter(trackers::user_id.eq(owner_id)),
        )
        .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::establish_test_connection;
    use crate::schema::{tasks, users};
    use crate::tables::{NewTask, NewUser, User};
    use chrono::Utc;

    fn insert_user(conn: &mut SqliteConnection, name: &str) -> User {
        diesel::insert_into(users::table)
            .values(&NewUser {
                email: &format!("{name}@example.com"),
                username: name,
                password_hash: "$argon2id$stub",
                created_at: Utc::now().naive_utc(),
            })
            .get_result(conn)
            .unwrap()
    }

    #[test]
    fn test_foreign_records_look_missing() {
        let conn = &mut establish_test_connection();
        let alice = insert_user(conn, "alice");
        let mallory = insert_user(conn, "mallory");

        let task: Task = diesel::insert_into(tasks::table)
            .values(&NewTask {
                title: "Private",
                completed: false,
                user_id: alice.id,
                created_at: Utc::now().naive_utc(),
            })
            .get_result(conn)
            .unwrap();

        assert_eq!(fetch_owned::<Task>(conn, alice.id, task.id).unwrap(), task);
        assert!(matches!(
            fetch_owned::<Task>(conn, mallory.id, task.id),
            Err(ApiError::NotFound("Task"))
        ));
        assert!(matches!(
            remove_owned::<Task>(conn, mallory.id, task.id),
            Err(ApiError::NotFound("Task"))
        ));

        remove_owned::<Task>(conn, alice.id, task.id).unwrap();
        assert!(matches!(
            fetch_owned::<Task>(conn, alice.id, task.id),
            Err(ApiError::NotFound("Task"))
        ));
    }
}
