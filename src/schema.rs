// Kept in sync with migrations/ by hand (`diesel print-schema` output for SQLite).

diesel::table! {
    notes (id) {
        id -> Integer,
        title -> Text,
        content -> Text,
        category -> Text,
        note_type -> Text,
        user_id -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    sessions (id) {
        id -> Integer,
        tracker_id -> Integer,
        start_time -> Timestamp,
        end_time -> Nullable<Timestamp>,
        duration -> Nullable<BigInt>,
    }
}

diesel::table! {
    tasks (id) {
        id -> Integer,
        title -> Text,
        completed -> Bool,
        user_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    trackers (id) {
        id -> Integer,
        title -> Text,
        total_time -> BigInt,
        target_duration -> Nullable<BigInt>,
        weekly_goal -> Nullable<BigInt>,
        is_running -> Bool,
        start_time -> Nullable<Timestamp>,
        user_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        email -> Text,
        username -> Text,
        password_hash -> Text,
        created_at -> Timestamp,
    }
}

diesel::joinable!(notes -> users (user_id));
diesel::joinable!(sessions -> trackers (tracker_id));
diesel::joinable!(tasks -> users (user_id));
diesel::joinable!(trackers -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(notes, sessions, tasks, trackers, users,);
