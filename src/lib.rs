pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod qr;
pub mod schema;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use dotenvy::dotenv;
use serde::Serialize;
use std::env;

use crate::error::{AppResult, Error};
use crate::model::{
    Activity, ActivityStats, NewActivity, NewScore, NewTeam, Score, ScoreDetail, Team,
    TeamStanding, TeamStats,
};
use crate::schema::{activity, score, team};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

// WAL mode allows concurrent reads during writes; the busy timeout retries
// locked operations instead of failing immediately.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; \
    PRAGMA journal_mode = WAL; \
    PRAGMA synchronous = NORMAL; \
    PRAGMA busy_timeout = 10000;";

#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Open a single connection using `DATABASE_URL` from the environment.
/// Used by the schema lifecycle binaries.
pub fn establish_connection() -> SqliteConnection {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");
    let mut conn = SqliteConnection::establish(&database_url)
        .unwrap_or_else(|e| panic!("Error connecting to {database_url}: {e}"));

    conn.batch_execute(CONNECTION_PRAGMAS)
        .expect("Failed to set SQLite PRAGMAs");

    conn
}

/// Build the long-lived r2d2 pool the server hands to every component.
/// Every pooled connection gets the same PRAGMA set on acquire.
pub fn create_pool(database_url: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
}

// ---------------------------------------------------------------------------
// Schema lifecycle
// ---------------------------------------------------------------------------

// The constraints below are the last line of defense for the domain rules:
// non-empty unique names, score components in [1,10], one score per
// (activity, team), and a total that is always the sum of its components.
// The ON DELETE CASCADE rules are a safety net only; the API refuses to
// delete a parent that still has scores.
const SCHEMA_DDL: &str = "
    CREATE TABLE IF NOT EXISTS activity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        activity_name TEXT NOT NULL UNIQUE CHECK(length(trim(activity_name)) > 0),
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TRIGGER IF NOT EXISTS activity_updated_at
    AFTER UPDATE ON activity
    FOR EACH ROW
    BEGIN
        UPDATE activity SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END;

    CREATE TABLE IF NOT EXISTS team (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_name TEXT NOT NULL UNIQUE CHECK(length(trim(team_name)) > 0),
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TRIGGER IF NOT EXISTS team_updated_at
    AFTER UPDATE ON team
    FOR EACH ROW
    BEGIN
        UPDATE team SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END;

    CREATE TABLE IF NOT EXISTS score (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        activity_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        creative_score INTEGER NOT NULL CHECK(creative_score >= 1 AND creative_score <= 10),
        participation_score INTEGER NOT NULL CHECK(participation_score >= 1 AND participation_score <= 10),
        bribe_score INTEGER NOT NULL CHECK(bribe_score >= 1 AND bribe_score <= 10),
        total_score INTEGER GENERATED ALWAYS AS (creative_score + participation_score + bribe_score) STORED,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (activity_id) REFERENCES activity(id) ON DELETE CASCADE,
        FOREIGN KEY (team_id) REFERENCES team(id) ON DELETE CASCADE,
        UNIQUE(activity_id, team_id)
    );

    CREATE TRIGGER IF NOT EXISTS score_updated_at
    AFTER UPDATE ON score
    FOR EACH ROW
    BEGIN
        UPDATE score SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
    END;

    CREATE TABLE IF NOT EXISTS qr_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        expires_at DATETIME NOT NULL,
        last_used_at DATETIME,
        used_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_qr_tokens_token ON qr_tokens(token);
    CREATE INDEX IF NOT EXISTS idx_qr_tokens_expires_at ON qr_tokens(expires_at);
";

const SAMPLE_ACTIVITIES: &[&str] = &[
    "Trivia Challenge",
    "Creative Showcase",
    "Team Building Exercise",
    "Presentation Contest",
];

const SAMPLE_TEAMS: &[&str] = &[
    "Team Alpha",
    "Team Beta",
    "Team Gamma",
    "Team Delta",
    "Team Epsilon",
];

/// Create all tables, triggers, and indexes, then seed the sample rows.
/// Safe to rerun: everything is IF NOT EXISTS / INSERT OR IGNORE.
pub fn init_schema(conn: &mut SqliteConnection) -> AppResult<()> {
    conn.transaction(|conn| {
        conn.batch_execute(SCHEMA_DDL)?;
        seed_sample_data(conn)?;
        Ok(())
    })
}

fn seed_sample_data(conn: &mut SqliteConnection) -> AppResult<()> {
    for name in SAMPLE_ACTIVITIES {
        diesel::insert_or_ignore_into(activity::table)
            .values(&NewActivity {
                activity_name: name,
            })
            .execute(conn)?;
    }
    for name in SAMPLE_TEAMS {
        diesel::insert_or_ignore_into(team::table)
            .values(&NewTeam { team_name: name })
            .execute(conn)?;
    }
    Ok(())
}

/// Row counts reported by `verify_schema`.
#[derive(Debug, Serialize)]
pub struct SchemaReport {
    pub activities: i64,
    pub teams: i64,
    pub scores: i64,
    pub qr_tokens: i64,
}

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    #[allow(dead_code)]
    name: String,
}

/// Assert that all required tables exist and report their row counts.
pub fn verify_schema(conn: &mut SqliteConnection) -> AppResult<SchemaReport> {
    for table in ["activity", "team", "score", "qr_tokens"] {
        let found: Option<TableName> =
            diesel::sql_query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind::<Text, _>(table)
                .get_result(conn)
                .optional()?;
        if found.is_none() {
            return Err(Error::Internal(format!("Table '{table}' does not exist")));
        }
    }

    Ok(SchemaReport {
        activities: activity::table.count().get_result(conn)?,
        teams: team::table.count().get_result(conn)?,
        scores: score::table.count().get_result(conn)?,
        qr_tokens: crate::schema::qr_tokens::table.count().get_result(conn)?,
    })
}

/// Drop every table (and with them their triggers). Safe to rerun.
pub fn drop_schema(conn: &mut SqliteConnection) -> AppResult<()> {
    conn.batch_execute(
        "DROP TABLE IF EXISTS score; \
         DROP TABLE IF EXISTS qr_tokens; \
         DROP TABLE IF EXISTS activity; \
         DROP TABLE IF EXISTS team;",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

fn validated_name(raw: &str, what: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::Validation(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

pub fn create_activity(conn: &mut SqliteConnection, name: &str) -> AppResult<Activity> {
    let name = validated_name(name, "Activity")?;

    let id: i32 = match diesel::insert_into(activity::table)
        .values(&NewActivity {
            activity_name: &name,
        })
        .returning(activity::id)
        .get_result(conn)
    {
        Ok(id) => id,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => return Err(Error::AlreadyExists { entity: "Activity" }),
        Err(e) => return Err(e.into()),
    };

    get_activity(conn, id)
}

pub fn get_activity(conn: &mut SqliteConnection, id: i32) -> AppResult<Activity> {
    activity::table
        .filter(activity::id.eq(id))
        .select(Activity::as_select())
        .first(conn)
        .optional()?
        .ok_or(Error::NotFound { entity: "Activity" })
}

pub fn list_activities(conn: &mut SqliteConnection) -> AppResult<Vec<Activity>> {
    Ok(activity::table
        .order(activity::activity_name)
        .select(Activity::as_select())
        .load(conn)?)
}

/// Activities with participation counts and average totals, for the public
/// overview.
pub fn list_activities_with_stats(conn: &mut SqliteConnection) -> AppResult<Vec<ActivityStats>> {
    Ok(diesel::sql_query(
        "SELECT activity.id, activity.activity_name, activity.created_at, activity.updated_at, \
                COUNT(score.id) AS teams_participated, \
                COALESCE(ROUND(AVG(score.total_score), 2), 0.0) AS avg_score \
         FROM activity \
         LEFT JOIN score ON activity.id = score.activity_id \
         GROUP BY activity.id \
         ORDER BY activity.activity_name",
    )
    .load(conn)?)
}

pub fn update_activity(conn: &mut SqliteConnection, id: i32, name: &str) -> AppResult<Activity> {
    let name = validated_name(name, "Activity")?;

    // Existence check first so a rename of a missing row is a 404, not a no-op.
    get_activity(conn, id)?;

    match diesel::update(activity::table.filter(activity::id.eq(id)))
        .set(activity::activity_name.eq(&name))
        .execute(conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => return Err(Error::AlreadyExists { entity: "Activity" }),
        Err(e) => return Err(e.into()),
    }

    get_activity(conn, id)
}

/// Delete an activity, refusing while any score depends on it. The cascade
/// rule in the schema should never fire through this path.
pub fn delete_activity(conn: &mut SqliteConnection, id: i32) -> AppResult<()> {
    get_activity(conn, id)?;

    let dependents: i64 = score::table
        .filter(score::activity_id.eq(id))
        .count()
        .get_result(conn)?;
    if dependents > 0 {
        return Err(Error::HasDependents {
            entity: "activity",
            count: dependents,
        });
    }

    diesel::delete(activity::table.filter(activity::id.eq(id))).execute(conn)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

pub fn create_team(conn: &mut SqliteConnection, name: &str) -> AppResult<Team> {
    let name = validated_name(name, "Team")?;

    let id: i32 = match diesel::insert_into(team::table)
        .values(&NewTeam { team_name: &name })
        .returning(team::id)
        .get_result(conn)
    {
        Ok(id) => id,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => return Err(Error::AlreadyExists { entity: "Team" }),
        Err(e) => return Err(e.into()),
    };

    get_team(conn, id)
}

pub fn get_team(conn: &mut SqliteConnection, id: i32) -> AppResult<Team> {
    team::table
        .filter(team::id.eq(id))
        .select(Team::as_select())
        .first(conn)
        .optional()?
        .ok_or(Error::NotFound { entity: "Team" })
}

pub fn list_teams(conn: &mut SqliteConnection) -> AppResult<Vec<Team>> {
    Ok(team::table
        .order(team::team_name)
        .select(Team::as_select())
        .load(conn)?)
}

pub fn list_teams_with_stats(conn: &mut SqliteConnection) -> AppResult<Vec<TeamStats>> {
    Ok(diesel::sql_query(
        "SELECT team.id, team.team_name, team.created_at, team.updated_at, \
                COUNT(score.id) AS activities_participated, \
                COALESCE(SUM(score.total_score), 0) AS total_score, \
                COALESCE(ROUND(AVG(score.total_score), 2), 0.0) AS avg_score \
         FROM team \
         LEFT JOIN score ON team.id = score.team_id \
         GROUP BY team.id \
         ORDER BY team.team_name",
    )
    .load(conn)?)
}

pub fn update_team(conn: &mut SqliteConnection, id: i32, name: &str) -> AppResult<Team> {
    let name = validated_name(name, "Team")?;

    get_team(conn, id)?;

    match diesel::update(team::table.filter(team::id.eq(id)))
        .set(team::team_name.eq(&name))
        .execute(conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => return Err(Error::AlreadyExists { entity: "Team" }),
        Err(e) => return Err(e.into()),
    }

    get_team(conn, id)
}

pub fn delete_team(conn: &mut SqliteConnection, id: i32) -> AppResult<()> {
    get_team(conn, id)?;

    let dependents: i64 = score::table
        .filter(score::team_id.eq(id))
        .count()
        .get_result(conn)?;
    if dependents > 0 {
        return Err(Error::HasDependents {
            entity: "team",
            count: dependents,
        });
    }

    diesel::delete(team::table.filter(team::id.eq(id))).execute(conn)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

fn validate_component(label: &str, value: i32) -> AppResult<()> {
    if !(1..=10).contains(&value) {
        return Err(Error::Validation(format!(
            "{label} must be between 1 and 10"
        )));
    }
    Ok(())
}

fn score_detail(conn: &mut SqliteConnection, id: i32) -> AppResult<ScoreDetail> {
    let row: Option<(Score, String, String)> = score::table
        .inner_join(team::table)
        .inner_join(activity::table)
        .filter(score::id.eq(id))
        .select((Score::as_select(), team::team_name, activity::activity_name))
        .first(conn)
        .optional()?;

    row.map(|(score, team_name, activity_name)| ScoreDetail {
        score,
        team_name,
        activity_name,
    })
    .ok_or(Error::NotFound { entity: "Score" })
}

/// Record a score for a (activity, team) pair.
///
/// Each pair gets at most one score row; a second submission fails and the
/// caller must use the update path. The race between the duplicate pre-check
/// and the insert is closed by the UNIQUE constraint.
pub fn create_score(conn: &mut SqliteConnection, new: &NewScore) -> AppResult<ScoreDetail> {
    validate_component("Creative score", new.creative_score)?;
    validate_component("Participation score", new.participation_score)?;
    validate_component("Bribe score", new.bribe_score)?;

    get_activity(conn, new.activity_id)?;
    get_team(conn, new.team_id)?;

    let id: i32 = match diesel::insert_into(score::table)
        .values(new)
        .returning(score::id)
        .get_result(conn)
    {
        Ok(id) => id,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => return Err(Error::AlreadyExists { entity: "Score" }),
        Err(e) => return Err(e.into()),
    };

    score_detail(conn, id)
}

pub fn get_score(conn: &mut SqliteConnection, id: i32) -> AppResult<ScoreDetail> {
    score_detail(conn, id)
}

/// Update the component scores of an existing row; omitted components keep
/// their current value. The stored generated column recomputes the total in
/// the same write.
pub fn update_score(
    conn: &mut SqliteConnection,
    id: i32,
    creative: Option<i32>,
    participation: Option<i32>,
    bribe: Option<i32>,
) -> AppResult<ScoreDetail> {
    let existing: Score = score::table
        .filter(score::id.eq(id))
        .select(Score::as_select())
        .first(conn)
        .optional()?
        .ok_or(Error::NotFound { entity: "Score" })?;

    let creative = creative.unwrap_or(existing.creative_score);
    let participation = participation.unwrap_or(existing.participation_score);
    let bribe = bribe.unwrap_or(existing.bribe_score);

    validate_component("Creative score", creative)?;
    validate_component("Participation score", participation)?;
    validate_component("Bribe score", bribe)?;

    diesel::update(score::table.filter(score::id.eq(id)))
        .set((
            score::creative_score.eq(creative),
            score::participation_score.eq(participation),
            score::bribe_score.eq(bribe),
        ))
        .execute(conn)?;

    score_detail(conn, id)
}

pub fn delete_score(conn: &mut SqliteConnection, id: i32) -> AppResult<()> {
    let deleted = diesel::delete(score::table.filter(score::id.eq(id))).execute(conn)?;
    if deleted == 0 {
        return Err(Error::NotFound { entity: "Score" });
    }
    Ok(())
}

fn load_score_details(
    rows: Vec<(Score, String, String)>,
) -> Vec<ScoreDetail> {
    rows.into_iter()
        .map(|(score, team_name, activity_name)| ScoreDetail {
            score,
            team_name,
            activity_name,
        })
        .collect()
}

/// All scores, grouped by activity name and ranked by total within each.
pub fn list_scores(conn: &mut SqliteConnection) -> AppResult<Vec<ScoreDetail>> {
    let rows = score::table
        .inner_join(team::table)
        .inner_join(activity::table)
        .order((activity::activity_name.asc(), score::total_score.desc()))
        .select((Score::as_select(), team::team_name, activity::activity_name))
        .load(conn)?;
    Ok(load_score_details(rows))
}

pub fn list_scores_for_activity(
    conn: &mut SqliteConnection,
    activity_id: i32,
) -> AppResult<Vec<ScoreDetail>> {
    let rows = score::table
        .inner_join(team::table)
        .inner_join(activity::table)
        .filter(score::activity_id.eq(activity_id))
        .order(score::total_score.desc())
        .select((Score::as_select(), team::team_name, activity::activity_name))
        .load(conn)?;
    Ok(load_score_details(rows))
}

pub fn list_scores_for_team(
    conn: &mut SqliteConnection,
    team_id: i32,
) -> AppResult<Vec<ScoreDetail>> {
    let rows = score::table
        .inner_join(team::table)
        .inner_join(activity::table)
        .filter(score::team_id.eq(team_id))
        .order(activity::activity_name.asc())
        .select((Score::as_select(), team::team_name, activity::activity_name))
        .load(conn)?;
    Ok(load_score_details(rows))
}

/// The public standings: every team with its total points across all
/// activities, highest first.
pub fn team_standings(conn: &mut SqliteConnection) -> AppResult<Vec<TeamStanding>> {
    Ok(diesel::sql_query(
        "SELECT team.id AS team_id, team.team_name, \
                COUNT(score.id) AS activities_played, \
                COALESCE(SUM(score.total_score), 0) AS total_points, \
                COALESCE(ROUND(AVG(score.total_score), 2), 0.0) AS avg_score \
         FROM team \
         LEFT JOIN score ON team.id = score.team_id \
         GROUP BY team.id \
         ORDER BY total_points DESC, team.team_name",
    )
    .load(conn)?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn setup() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").expect("in-memory DB");
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .expect("enable foreign keys");
        init_schema(&mut conn).expect("init schema");
        conn
    }

    fn sample_score(activity_id: i32, team_id: i32, c: i32, p: i32, b: i32) -> NewScore {
        NewScore {
            activity_id,
            team_id,
            creative_score: c,
            participation_score: p,
            bribe_score: b,
        }
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let mut conn = setup();
        init_schema(&mut conn).expect("second init");

        let report = verify_schema(&mut conn).expect("verify");
        assert_eq!(report.activities, 4);
        assert_eq!(report.teams, 5);
        assert_eq!(report.scores, 0);
        assert_eq!(report.qr_tokens, 0);
    }

    #[test]
    fn test_drop_schema_removes_tables() {
        let mut conn = setup();
        drop_schema(&mut conn).expect("drop");
        assert!(verify_schema(&mut conn).is_err());
        // Safe to rerun.
        drop_schema(&mut conn).expect("second drop");
    }

    #[test]
    fn test_create_activity_trims_and_timestamps() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "  Karaoke Night  ").unwrap();
        assert_eq!(act.activity_name, "Karaoke Night");
        assert!(act.created_at.and_utc().timestamp() > 0);
        assert_eq!(act.created_at, act.updated_at);
    }

    #[test]
    fn test_create_activity_rejects_empty_name() {
        let mut conn = setup();
        assert_matches!(create_activity(&mut conn, ""), Err(Error::Validation(_)));
        assert_matches!(
            create_activity(&mut conn, "   "),
            Err(Error::Validation(_))
        );
    }

    #[test]
    fn test_create_activity_rejects_duplicate_name() {
        let mut conn = setup();
        create_activity(&mut conn, "Karaoke Night").unwrap();
        assert_matches!(
            create_activity(&mut conn, "Karaoke Night"),
            Err(Error::AlreadyExists { entity: "Activity" })
        );
    }

    #[test]
    fn test_update_activity() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Karaoke Night").unwrap();

        let renamed = update_activity(&mut conn, act.id, "Karaoke Evening").unwrap();
        assert_eq!(renamed.activity_name, "Karaoke Evening");

        assert_matches!(
            update_activity(&mut conn, 9999, "Ghost"),
            Err(Error::NotFound { entity: "Activity" })
        );
        assert_matches!(
            update_activity(&mut conn, act.id, "Trivia Challenge"),
            Err(Error::AlreadyExists { entity: "Activity" })
        );
    }

    #[test]
    fn test_updated_at_refreshes_on_update() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Karaoke Night").unwrap();

        // CURRENT_TIMESTAMP has one-second resolution.
        std::thread::sleep(std::time::Duration::from_millis(1100));

        let renamed = update_activity(&mut conn, act.id, "Karaoke Evening").unwrap();
        assert_eq!(renamed.created_at, act.created_at);
        assert!(renamed.updated_at > act.updated_at);
    }

    #[test]
    fn test_delete_activity_without_scores_succeeds() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Karaoke Night").unwrap();
        delete_activity(&mut conn, act.id).unwrap();
        assert_matches!(
            get_activity(&mut conn, act.id),
            Err(Error::NotFound { entity: "Activity" })
        );
        assert_matches!(
            delete_activity(&mut conn, act.id),
            Err(Error::NotFound { entity: "Activity" })
        );
    }

    #[test]
    fn test_team_crud() {
        let mut conn = setup();
        let t = create_team(&mut conn, "  Team Zeta ").unwrap();
        assert_eq!(t.team_name, "Team Zeta");

        assert_matches!(
            create_team(&mut conn, "Team Zeta"),
            Err(Error::AlreadyExists { entity: "Team" })
        );
        assert_matches!(create_team(&mut conn, " "), Err(Error::Validation(_)));

        let renamed = update_team(&mut conn, t.id, "Team Eta").unwrap();
        assert_eq!(renamed.team_name, "Team Eta");

        delete_team(&mut conn, t.id).unwrap();
        assert_matches!(
            get_team(&mut conn, t.id),
            Err(Error::NotFound { entity: "Team" })
        );
    }

    #[test]
    fn test_list_orders_by_name() {
        let mut conn = setup();
        let activities = list_activities(&mut conn).unwrap();
        let names: Vec<_> = activities.iter().map(|a| a.activity_name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(activities.len(), 4);

        let teams = list_teams(&mut conn).unwrap();
        assert_eq!(teams.len(), 5);
        assert_eq!(teams[0].team_name, "Team Alpha");
    }

    #[test]
    fn test_create_score_computes_total() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();

        let detail = create_score(&mut conn, &sample_score(act.id, t.id, 7, 8, 9)).unwrap();
        assert_eq!(detail.score.total_score, 24);
        assert_eq!(detail.team_name, "Alpha");
        assert_eq!(detail.activity_name, "Trivia");
    }

    #[test]
    fn test_create_score_validates_range() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();

        assert_matches!(
            create_score(&mut conn, &sample_score(act.id, t.id, 0, 5, 5)),
            Err(Error::Validation(_))
        );
        assert_matches!(
            create_score(&mut conn, &sample_score(act.id, t.id, 5, 11, 5)),
            Err(Error::Validation(_))
        );
        assert_matches!(
            create_score(&mut conn, &sample_score(act.id, t.id, 5, 5, -1)),
            Err(Error::Validation(_))
        );
    }

    #[test]
    fn test_create_score_requires_existing_parents() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();

        assert_matches!(
            create_score(&mut conn, &sample_score(9999, t.id, 5, 5, 5)),
            Err(Error::NotFound { entity: "Activity" })
        );
        assert_matches!(
            create_score(&mut conn, &sample_score(act.id, 9999, 5, 5, 5)),
            Err(Error::NotFound { entity: "Team" })
        );
    }

    #[test]
    fn test_score_check_constraint_backstops_validation() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();

        // Bypass the application-level validation; the store must still
        // reject the write rather than clamp it.
        let result = diesel::sql_query(format!(
            "INSERT INTO score (activity_id, team_id, creative_score, participation_score, bribe_score) \
             VALUES ({}, {}, 11, 5, 5)",
            act.id, t.id
        ))
        .execute(&mut conn);
        assert_matches!(result, Err(diesel::result::Error::DatabaseError(..)));

        let count: i64 = score::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_total_score_is_not_independently_writable() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();
        let detail = create_score(&mut conn, &sample_score(act.id, t.id, 7, 8, 9)).unwrap();

        let result = diesel::sql_query(format!(
            "UPDATE score SET total_score = 99 WHERE id = {}",
            detail.score.id
        ))
        .execute(&mut conn);
        assert!(result.is_err(), "generated column must reject direct writes");
    }

    #[test]
    fn test_duplicate_score_for_pair_rejected() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let beta = create_team(&mut conn, "Beta").unwrap();

        create_score(&mut conn, &sample_score(act.id, alpha.id, 7, 8, 9)).unwrap();
        assert_matches!(
            create_score(&mut conn, &sample_score(act.id, alpha.id, 6, 6, 6)),
            Err(Error::AlreadyExists { entity: "Score" })
        );

        // A different team in the same activity is fine.
        create_score(&mut conn, &sample_score(act.id, beta.id, 6, 6, 6)).unwrap();
    }

    #[test]
    fn test_update_score_recomputes_total() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();
        let detail = create_score(&mut conn, &sample_score(act.id, t.id, 7, 8, 9)).unwrap();

        let updated =
            update_score(&mut conn, detail.score.id, Some(10), Some(10), Some(10)).unwrap();
        assert_eq!(updated.score.total_score, 30);

        // Partial update keeps the other components.
        let updated = update_score(&mut conn, detail.score.id, Some(1), None, None).unwrap();
        assert_eq!(updated.score.creative_score, 1);
        assert_eq!(updated.score.participation_score, 10);
        assert_eq!(updated.score.total_score, 21);

        assert_matches!(
            update_score(&mut conn, detail.score.id, Some(0), None, None),
            Err(Error::Validation(_))
        );
        assert_matches!(
            update_score(&mut conn, 9999, Some(5), None, None),
            Err(Error::NotFound { entity: "Score" })
        );
    }

    #[test]
    fn test_delete_parent_with_scores_reports_dependents() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let beta = create_team(&mut conn, "Beta").unwrap();
        create_score(&mut conn, &sample_score(act.id, alpha.id, 7, 8, 9)).unwrap();
        create_score(&mut conn, &sample_score(act.id, beta.id, 6, 6, 6)).unwrap();

        assert_matches!(
            delete_activity(&mut conn, act.id),
            Err(Error::HasDependents { entity: "activity", count: 2 })
        );
        assert_matches!(
            delete_team(&mut conn, alpha.id),
            Err(Error::HasDependents { entity: "team", count: 1 })
        );
    }

    #[test]
    fn test_cascade_delete_is_only_a_safety_net() {
        let mut conn = setup();
        let act = create_activity(&mut conn, "Trivia").unwrap();
        let t = create_team(&mut conn, "Alpha").unwrap();
        create_score(&mut conn, &sample_score(act.id, t.id, 7, 8, 9)).unwrap();

        // Deleting underneath the API (e.g. a manual sqlite3 session) cascades.
        diesel::sql_query(format!("DELETE FROM activity WHERE id = {}", act.id))
            .execute(&mut conn)
            .unwrap();

        let count: i64 = score::table.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_score_listings() {
        let mut conn = setup();
        let trivia = create_activity(&mut conn, "Trivia").unwrap();
        let karaoke = create_activity(&mut conn, "Karaoke").unwrap();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let beta = create_team(&mut conn, "Beta").unwrap();

        create_score(&mut conn, &sample_score(trivia.id, alpha.id, 5, 5, 5)).unwrap();
        create_score(&mut conn, &sample_score(trivia.id, beta.id, 9, 9, 9)).unwrap();
        create_score(&mut conn, &sample_score(karaoke.id, alpha.id, 10, 10, 10)).unwrap();

        let by_activity = list_scores_for_activity(&mut conn, trivia.id).unwrap();
        assert_eq!(by_activity.len(), 2);
        assert_eq!(by_activity[0].team_name, "Beta");
        assert_eq!(by_activity[1].team_name, "Alpha");

        let by_team = list_scores_for_team(&mut conn, alpha.id).unwrap();
        assert_eq!(by_team.len(), 2);
        assert_eq!(by_team[0].activity_name, "Karaoke");
        assert_eq!(by_team[1].activity_name, "Trivia");

        let all = list_scores(&mut conn).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].activity_name, "Karaoke");
    }

    #[test]
    fn test_team_standings_aggregation() {
        let mut conn = setup();
        let trivia = create_activity(&mut conn, "Trivia").unwrap();
        let karaoke = create_activity(&mut conn, "Karaoke").unwrap();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let beta = create_team(&mut conn, "Beta").unwrap();

        create_score(&mut conn, &sample_score(trivia.id, alpha.id, 5, 5, 5)).unwrap(); // 15
        create_score(&mut conn, &sample_score(karaoke.id, alpha.id, 7, 7, 7)).unwrap(); // 21
        create_score(&mut conn, &sample_score(trivia.id, beta.id, 10, 10, 10)).unwrap(); // 30

        let standings = team_standings(&mut conn).unwrap();
        // Alpha has 36 across two activities, Beta 30 across one; the seeded
        // sample teams trail with zero.
        assert_eq!(standings[0].team_name, "Alpha");
        assert_eq!(standings[0].total_points, 36);
        assert_eq!(standings[0].activities_played, 2);
        assert_eq!(standings[0].avg_score, 18.0);
        assert_eq!(standings[1].team_name, "Beta");
        assert_eq!(standings[1].total_points, 30);

        let zero_rows: Vec<_> = standings.iter().filter(|s| s.total_points == 0).collect();
        assert_eq!(zero_rows.len(), 5);
    }

    #[test]
    fn test_stats_listings() {
        let mut conn = setup();
        let trivia = create_activity(&mut conn, "Trivia").unwrap();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let beta = create_team(&mut conn, "Beta").unwrap();
        create_score(&mut conn, &sample_score(trivia.id, alpha.id, 5, 5, 5)).unwrap(); // 15
        create_score(&mut conn, &sample_score(trivia.id, beta.id, 9, 9, 9)).unwrap(); // 27

        let stats = list_activities_with_stats(&mut conn).unwrap();
        let trivia_stats = stats.iter().find(|s| s.id == trivia.id).unwrap();
        assert_eq!(trivia_stats.teams_participated, 2);
        assert_eq!(trivia_stats.avg_score, 21.0);

        let seeded = stats
            .iter()
            .find(|s| s.activity_name == "Trivia Challenge")
            .unwrap();
        assert_eq!(seeded.teams_participated, 0);
        assert_eq!(seeded.avg_score, 0.0);

        let team_stats = list_teams_with_stats(&mut conn).unwrap();
        let alpha_stats = team_stats.iter().find(|s| s.id == alpha.id).unwrap();
        assert_eq!(alpha_stats.activities_participated, 1);
        assert_eq!(alpha_stats.total_score, 15);
        assert_eq!(alpha_stats.avg_score, 15.0);
    }

    #[test]
    fn test_full_scenario() {
        let mut conn = setup();
        let alpha = create_team(&mut conn, "Alpha").unwrap();
        let _beta = create_team(&mut conn, "Beta").unwrap();
        let trivia = create_activity(&mut conn, "Trivia").unwrap();

        let detail = create_score(&mut conn, &sample_score(trivia.id, alpha.id, 7, 8, 9)).unwrap();
        assert_eq!(detail.score.total_score, 24);

        assert_matches!(
            create_score(&mut conn, &sample_score(trivia.id, alpha.id, 6, 6, 6)),
            Err(Error::AlreadyExists { entity: "Score" })
        );

        let updated =
            update_score(&mut conn, detail.score.id, Some(10), Some(10), Some(10)).unwrap();
        assert_eq!(updated.score.total_score, 30);

        assert_matches!(
            delete_activity(&mut conn, trivia.id),
            Err(Error::HasDependents { entity: "activity", count: 1 })
        );

        delete_score(&mut conn, detail.score.id).unwrap();
        delete_activity(&mut conn, trivia.id).unwrap();
    }
}
