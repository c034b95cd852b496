//! QR token issue, validation, and cleanup.
//!
//! A QR token is a bearer credential embedded in a scannable login link. It
//! is independent of any session: presenting a live token (before expiry,
//! under the use cap) establishes a fresh session exactly as a password
//! login would. Tokens survive exhaustion and are only removed by the
//! expired-token cleanup or by hand.

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use qrcode::render::svg;
use qrcode::QrCode;
use rand::Rng;
use serde::Serialize;

use crate::error::{AppResult, Error};
use crate::model::{NewQrToken, QrToken};
use crate::schema::qr_tokens;

/// Token entropy in bytes; hex-encoded to twice this many characters.
const TOKEN_BYTES: usize = 32;

/// Issue bounds, in hours (1 hour to 7 days).
const MIN_EXPIRES_HOURS: i64 = 1;
const MAX_EXPIRES_HOURS: i64 = 168;

/// A freshly issued token together with everything the admin page needs to
/// display it.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedQrToken {
    pub token: String,
    pub login_url: String,
    pub expires_at: NaiveDateTime,
    pub expires_in_hours: i64,
    pub description: String,
    /// The login URL rendered as an SVG QR code.
    pub qr_svg: String,
}

/// Generate an unguessable token: 32 random bytes, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the login URL a QR code points at.
fn login_url(base_url: &str, token: &str) -> String {
    format!("{}/qr-login?token={}", base_url.trim_end_matches('/'), token)
}

/// Issue a new QR token valid for `expires_in_hours` (1..=168) and persist it.
pub fn issue_qr_token(
    conn: &mut SqliteConnection,
    expires_in_hours: i64,
    description: &str,
    base_url: &str,
) -> AppResult<IssuedQrToken> {
    if !(MIN_EXPIRES_HOURS..=MAX_EXPIRES_HOURS).contains(&expires_in_hours) {
        return Err(Error::Validation(
            "Expiration time must be between 1 and 168 hours (7 days)".to_string(),
        ));
    }

    let token = generate_token();
    let expires_at = Utc::now().naive_utc() + Duration::hours(expires_in_hours);

    diesel::insert_into(qr_tokens::table)
        .values(&NewQrToken {
            token: &token,
            description,
            expires_at,
        })
        .execute(conn)?;

    let url = login_url(base_url, &token);
    let code = QrCode::new(url.as_bytes()).map_err(|e| Error::Internal(e.to_string()))?;
    let qr_svg = code.render::<svg::Color>().min_dimensions(300, 300).build();

    Ok(IssuedQrToken {
        token,
        login_url: url,
        expires_at,
        expires_in_hours,
        description: description.to_string(),
        qr_svg,
    })
}

/// Validate a token and consume one use.
///
/// The remaining-uses check and the increment are a single conditional
/// UPDATE, so concurrent validations of the same token can never push
/// `used_count` past `max_uses`: exactly one statement wins the final use.
pub fn validate_qr_token(
    conn: &mut SqliteConnection,
    token: &str,
    max_uses: i32,
) -> AppResult<bool> {
    if token.is_empty() {
        return Ok(false);
    }

    let now = Utc::now().naive_utc();
    let updated = diesel::update(
        qr_tokens::table.filter(
            qr_tokens::token
                .eq(token)
                .and(qr_tokens::expires_at.gt(now))
                .and(qr_tokens::used_count.lt(max_uses)),
        ),
    )
    .set((
        qr_tokens::used_count.eq(qr_tokens::used_count + 1),
        qr_tokens::last_used_at.eq(Some(now)),
    ))
    .execute(conn)?;

    Ok(updated == 1)
}

/// Delete every token whose expiry has passed. Returns how many were removed.
pub fn cleanup_expired_tokens(conn: &mut SqliteConnection) -> AppResult<usize> {
    let now = Utc::now().naive_utc();
    let removed = diesel::delete(qr_tokens::table.filter(qr_tokens::expires_at.lt(now)))
        .execute(conn)?;
    Ok(removed)
}

/// All non-expired tokens, newest first, for the admin listing. Exhausted
/// tokens are included; only expiry filters a token out of this view.
pub fn list_active_tokens(conn: &mut SqliteConnection) -> AppResult<Vec<QrToken>> {
    let now = Utc::now().naive_utc();
    let tokens = qr_tokens::table
        .filter(qr_tokens::expires_at.gt(now))
        .order(qr_tokens::created_at.desc())
        .select(QrToken::as_select())
        .load(conn)?;
    Ok(tokens)
}
