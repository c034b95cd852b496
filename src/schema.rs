// Written by hand to match the DDL in `init_schema`. Note that `total_score`
// is a stored generated column: it can be selected but never inserted or set.

diesel::table! {
    activity (id) {
        id -> Integer,
        activity_name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    team (id) {
        id -> Integer,
        team_name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    score (id) {
        id -> Integer,
        activity_id -> Integer,
        team_id -> Integer,
        creative_score -> Integer,
        participation_score -> Integer,
        bribe_score -> Integer,
        total_score -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    qr_tokens (id) {
        id -> Integer,
        token -> Text,
        description -> Text,
        created_at -> Timestamp,
        expires_at -> Timestamp,
        last_used_at -> Nullable<Timestamp>,
        used_count -> Integer,
    }
}

diesel::joinable!(score -> activity (activity_id));
diesel::joinable!(score -> team (team_id));

diesel::allow_tables_to_appear_in_same_query!(activity, team, score, qr_tokens);
