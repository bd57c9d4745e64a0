// Diesel schema shared by the SQLite and Postgres backends.
// Tablas: flow_requests, failure_reports, assignments, maintenance_reports, events
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    flow_requests (id) {
        id -> Text,
        lot_id -> Text,
        kind -> Text,
        status -> Text,
        created_by -> Text,
        created_at_ts -> BigInt,
        payload -> Text,
    }
}
diesel::table! {
    failure_reports (id) {
        id -> Text,
        kind -> Text,
        lot_id -> Nullable<Text>,
        status -> Text,
        created_by -> Text,
        created_at_ts -> BigInt,
        payload -> Text,
    }
}
diesel::table! {
    assignments (id) {
        id -> Text,
        target_type -> Text,
        target_id -> Text,
        assigned_by -> Text,
        assigned_to -> Text,
        reassigned -> Bool,
        assigned_at_ts -> BigInt,
        payload -> Text,
    }
}
diesel::table! {
    maintenance_reports (id) {
        id -> Text,
        assignment_id -> Text,
        approved -> Bool,
        created_at_ts -> BigInt,
        payload -> Text,
    }
}
diesel::table! {
    events (id) {
        id -> Text,
        stream -> Text,
        cursor -> BigInt,
        key -> Text,
        payload -> Text,
        metadata -> Text,
        command_id -> Nullable<Text>,
        created_at_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(flow_requests, failure_reports, assignments, maintenance_reports, events);
