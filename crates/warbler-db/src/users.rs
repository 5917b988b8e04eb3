use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{DbError, Result, map_unique_violation};
use crate::models::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, ProfileUpdate, USER_COLUMNS, User, non_empty,
};
use crate::password::{hash_password, verify_password};
use crate::Database;

impl Database {
    /// Register a user. The password is hashed before it reaches the store.
    ///
    /// Missing fields and taken usernames or emails come back as
    /// [`DbError::Validation`].
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> Result<User> {
        // Stored exactly as given; blank-only values count as missing
        if username.trim().is_empty() {
            return Err(DbError::validation("Username is required"));
        }
        if email.trim().is_empty() {
            return Err(DbError::validation("Email is required"));
        }
        if password.is_empty() {
            return Err(DbError::validation("Password is required"));
        }

        let password_hash = hash_password(password)?;
        let image_url = non_empty(image_url).unwrap_or(DEFAULT_IMAGE_URL);

        let user = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, image_url) VALUES (?1, ?2, ?3, ?4)",
                (username, email, &password_hash, image_url),
            )
            .map_err(map_unique_violation)?;

            query_user_by_id(conn, conn.last_insert_rowid())?.ok_or(DbError::Missing("user"))
        })?;

        info!("Signed up {}", user);
        Ok(user)
    }

    /// `Some(user)` only when the username exists and the password matches.
    /// Callers cannot tell an unknown user from a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.with_conn(|conn| query_user_by_username(conn, username))?;
        Ok(user.filter(|u| verify_password(password, &u.password)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    /// All users, or those whose username contains `needle`.
    pub fn search_users(&self, needle: Option<&str>) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let users = match non_empty(needle) {
                Some(needle) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {USER_COLUMNS} FROM users u WHERE instr(u.username, ?1) > 0 ORDER BY u.id"
                    ))?;
                    stmt.query_map([needle], User::from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.id"))?;
                    stmt.query_map([], User::from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(users)
        })
    }

    pub fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User> {
        let username = update.username.as_str();
        let email = update.email.as_str();
        if username.trim().is_empty() {
            return Err(DbError::validation("Username is required"));
        }
        if email.trim().is_empty() {
            return Err(DbError::validation("Email is required"));
        }

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET username = ?1, email = ?2, image_url = ?3, header_image_url = ?4,
                     bio = ?5, location = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    username,
                    email,
                    non_empty(update.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL),
                    non_empty(update.header_image_url.as_deref())
                        .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
                    non_empty(update.bio.as_deref()),
                    non_empty(update.location.as_deref()),
                    id,
                ],
            )
            .map_err(map_unique_violation)?;

            query_user_by_id(conn, id)?.ok_or(DbError::Missing("user"))
        })
    }

    /// Removes the user along with their messages and follow edges.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let deleted = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0)
        })?;

        if deleted {
            info!("Deleted user #{}", id);
        }
        Ok(deleted)
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            [id],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
            [username],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}
