use std::env;

/// Runtime configuration loaded from the environment (`.env` supported via
/// dotenvy in `main`).
///
/// `DATABASE_URL`, `ADMIN_PASSWORD`, and `PASSWORD_SALT` are required; the
/// rest have defaults suitable for local use.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_url: String,
    /// Shared admin secret for password login.
    pub admin_password: String,
    /// Fixed salt mixed into the password digest.
    pub password_salt: String,
    /// Session lifetime in seconds, measured from establishment (default 3600).
    pub session_lifetime_secs: i64,
    /// Maximum number of times a QR token may be presented (default 50).
    pub qr_max_uses: i32,
    /// Public base URL embedded in QR login links (default `http://localhost:3000`).
    pub base_url: String,
    /// Bind address (default `0.0.0.0`).
    pub host: String,
    /// Bind port (default `3000`).
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env.");
        let admin_password =
            env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set in .env.");
        let password_salt =
            env::var("PASSWORD_SALT").expect("PASSWORD_SALT must be set in .env.");

        let session_lifetime_secs: i64 = env::var("SESSION_LIFETIME")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("SESSION_LIFETIME must be a number of seconds");

        let qr_max_uses: i32 = env::var("QR_MAX_USES")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("QR_MAX_USES must be a number");

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        Self {
            database_url,
            admin_password,
            password_salt,
            session_lifetime_secs,
            qr_max_uses,
            base_url,
            host,
            port,
        }
    }
}
