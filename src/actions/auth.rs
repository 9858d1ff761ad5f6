//! Account creation, credential verification, and bearer-session lifecycle.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::auth::{generate_session_token, hash_password, verify_password, SESSION_TTL_MILLIS};
use crate::auth::MIN_PASSWORD_LENGTH;
use crate::db::Database;
use crate::error::{AppError, AppResult, ValidationIssue};
use crate::models::{AuthSession, SignInInput, SignUpInput, User};

use super::{lock_conn, now_millis};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
    })
}

fn validate_sign_up(input: &SignUpInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if !email_pattern().is_match(input.email.trim()) {
        issues.push(ValidationIssue::new("email", "Enter a valid email address"));
    }
    if input.password.len() < MIN_PASSWORD_LENGTH {
        issues.push(ValidationIssue::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    issues
}

/// Create an account and immediately open a session for it.
pub fn sign_up(db: &Database, input: &SignUpInput) -> AppResult<(User, AuthSession)> {
    let issues = validate_sign_up(input);
    if !issues.is_empty() {
        return Err(AppError::validation(issues));
    }

    let email = input.email.trim().to_string();
    let conn = lock_conn(db)?;

    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [&email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::validation(vec![ValidationIssue::new(
            "email",
            "An account with this email already exists",
        )]));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(&input.password)?,
        created_at: now_millis(),
    };

    conn.execute(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user.id, user.email, user.password_hash, user.created_at],
    )?;

    let session = insert_session(&conn, &user.id)?;
    log::info!("New account registered: {}", user.id);
    Ok((user, session))
}

/// Verify credentials and open a session. The same error covers an unknown
/// email and a wrong password.
pub fn sign_in(db: &Database, input: &SignInInput) -> AppResult<(User, AuthSession)> {
    let email = input.email.trim();
    let conn = lock_conn(db)?;

    let user = match conn.query_row(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
        [email],
        map_user,
    ) {
        Ok(user) => user,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let session = insert_session(&conn, &user.id)?;
    Ok((user, session))
}

/// Revoke one session token. Unknown tokens are a no-op.
pub fn sign_out(db: &Database, token: &str) -> AppResult<()> {
    let conn = lock_conn(db)?;
    conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
    Ok(())
}

/// Resolve a bearer token to its user. Expired sessions are deleted on sight.
pub fn current_user(db: &Database, token: &str) -> AppResult<User> {
    let conn = lock_conn(db)?;

    let (user, expires_at): (User, i64) = match conn.query_row(
        "SELECT u.id, u.email, u.password_hash, u.created_at, s.expires_at
         FROM auth_sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1",
        [token],
        |row| {
            Ok((
                User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                },
                row.get(4)?,
            ))
        },
    ) {
        Ok(found) => found,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AppError::NotAuthenticated),
        Err(e) => return Err(e.into()),
    };

    if expires_at <= now_millis() {
        conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
        return Err(AppError::NotAuthenticated);
    }

    Ok(user)
}

fn insert_session(conn: &rusqlite::Connection, user_id: &str) -> AppResult<AuthSession> {
    let now = now_millis();
    let session = AuthSession {
        token: generate_session_token(),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + SESSION_TTL_MILLIS,
    };
    conn.execute(
        "INSERT INTO auth_sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![session.token, session.user_id, session.created_at, session.expires_at],
    )?;
    Ok(session)
}

fn map_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn credentials(email: &str) -> SignUpInput {
        SignUpInput {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
        }
    }

    #[test]
    fn sign_up_then_current_user() {
        let db = db();
        let (user, session) = sign_up(&db, &credentials("a@example.com")).unwrap();

        let resolved = current_user(&db, &session.token).unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.email, "a@example.com");
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let db = db();
        sign_up(&db, &credentials("a@example.com")).unwrap();

        let err = sign_up(&db, &credentials("A@Example.COM")).unwrap_err();
        let issues = err.issues().expect("validation issues");
        assert_eq!(issues[0].field, "email");
        assert!(issues[0].message.contains("already exists"));
    }

    #[test]
    fn invalid_email_and_short_password_are_both_reported() {
        let db = db();
        let err = sign_up(
            &db,
            &SignUpInput {
                email: "not-an-email".into(),
                password: "short".into(),
            },
        )
        .unwrap_err();
        let issues = err.issues().expect("validation issues");
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn sign_in_with_wrong_password_fails_uniformly() {
        let db = db();
        sign_up(&db, &credentials("a@example.com")).unwrap();

        let wrong = sign_in(
            &db,
            &SignInInput {
                email: "a@example.com".into(),
                password: "not-the-password".into(),
            },
        );
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

        let unknown = sign_in(
            &db,
            &SignInInput {
                email: "nobody@example.com".into(),
                password: "hunter2hunter2".into(),
            },
        );
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn sign_out_revokes_the_token() {
        let db = db();
        let (_, session) = sign_up(&db, &credentials("a@example.com")).unwrap();

        sign_out(&db, &session.token).unwrap();
        assert!(matches!(
            current_user(&db, &session.token),
            Err(AppError::NotAuthenticated)
        ));
    }

    #[test]
    fn expired_session_is_rejected_and_removed() {
        let db = db();
        let (_, session) = sign_up(&db, &credentials("a@example.com")).unwrap();

        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE auth_sessions SET expires_at = ?1 WHERE token = ?2",
                rusqlite::params![now_millis() - 1_000, session.token],
            )
            .unwrap();
        }

        assert!(matches!(
            current_user(&db, &session.token),
            Err(AppError::NotAuthenticated)
        ));

        let conn = db.conn.lock().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM auth_sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
