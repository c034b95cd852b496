use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Text, Timestamp};
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::activity)]
#[diesel(check_for_backend(Sqlite))]
pub struct Activity {
    pub id: i32,
    pub activity_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::activity)]
pub struct NewActivity<'a> {
    pub activity_name: &'a str,
    // created_at and updated_at use defaults
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::team)]
#[diesel(check_for_backend(Sqlite))]
pub struct Team {
    pub id: i32,
    pub team_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::team)]
pub struct NewTeam<'a> {
    pub team_name: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::score)]
#[diesel(check_for_backend(Sqlite))]
pub struct Score {
    pub id: i32,
    pub activity_id: i32,
    pub team_id: i32,
    pub creative_score: i32,
    pub participation_score: i32,
    pub bribe_score: i32,
    pub total_score: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::score)]
pub struct NewScore {
    pub activity_id: i32,
    pub team_id: i32,
    pub creative_score: i32,
    pub participation_score: i32,
    pub bribe_score: i32,
    // total_score is generated by the store, created_at/updated_at use defaults
}

/// A score joined with the names of its parent team and activity, as served
/// by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDetail {
    #[serde(flatten)]
    pub score: Score,
    pub team_name: String,
    pub activity_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::qr_tokens)]
#[diesel(check_for_backend(Sqlite))]
pub struct QrToken {
    pub id: i32,
    pub token: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub last_used_at: Option<NaiveDateTime>,
    pub used_count: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::qr_tokens)]
pub struct NewQrToken<'a> {
    pub token: &'a str,
    pub description: &'a str,
    pub expires_at: NaiveDateTime,
    // created_at uses default, used_count starts at 0
}

/// Per-activity participation statistics (`GET /api/activities?stats=true`).
#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct ActivityStats {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub activity_name: String,
    #[diesel(sql_type = Timestamp)]
    pub created_at: NaiveDateTime,
    #[diesel(sql_type = Timestamp)]
    pub updated_at: NaiveDateTime,
    #[diesel(sql_type = BigInt)]
    pub teams_participated: i64,
    #[diesel(sql_type = Double)]
    pub avg_score: f64,
}

/// Per-team participation statistics (`GET /api/teams?stats=true`).
#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct TeamStats {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub team_name: String,
    #[diesel(sql_type = Timestamp)]
    pub created_at: NaiveDateTime,
    #[diesel(sql_type = Timestamp)]
    pub updated_at: NaiveDateTime,
    #[diesel(sql_type = BigInt)]
    pub activities_participated: i64,
    #[diesel(sql_type = BigInt)]
    pub total_score: i64,
    #[diesel(sql_type = Double)]
    pub avg_score: f64,
}

/// One row of the public standings table, ordered by total points.
#[derive(Debug, Clone, Serialize, QueryableByName)]
pub struct TeamStanding {
    #[diesel(sql_type = Integer)]
    pub team_id: i32,
    #[diesel(sql_type = Text)]
    pub team_name: String,
    #[diesel(sql_type = BigInt)]
    pub activities_played: i64,
    #[diesel(sql_type = BigInt)]
    pub total_points: i64,
    #[diesel(sql_type = Double)]
    pub avg_score: f64,
}
