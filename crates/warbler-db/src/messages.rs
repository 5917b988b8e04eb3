use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{DbError, Result};
use crate::models::{MESSAGE_COLUMNS, MESSAGE_MAX_CHARS, Message};
use crate::Database;

impl Database {
    pub fn create_message(&self, user_id: i64, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DbError::validation("Message text is required"));
        }
        if text.chars().count() > MESSAGE_MAX_CHARS {
            return Err(DbError::validation(format!(
                "Messages are limited to {MESSAGE_MAX_CHARS} characters"
            )));
        }

        let message = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (text, user_id) VALUES (?1, ?2)",
                rusqlite::params![text, user_id],
            )?;
            query_message(conn, conn.last_insert_rowid())?.ok_or(DbError::Missing("message"))
        })?;

        info!("User #{} posted message #{}", user_id, message.id);
        Ok(message)
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0))
    }

    /// A user's own messages, newest first.
    pub fn messages_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], Message::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest messages by `user_id` and everyone they follow.
    pub fn timeline(&self, user_id: i64, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], Message::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn message_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<Message>> {
    let message = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.id = ?1"
            ),
            [id],
            Message::from_row,
        )
        .optional()?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("testuser", "test@test.com", "HASHED_PASSWORD", None).unwrap();
        (db, user.id)
    }

    #[test]
    fn create_and_fetch_carries_author_details() {
        let (db, uid) = db_with_user();

        let message = db.create_message(uid, "new message").unwrap();
        assert_eq!(message.text, "new message");
        assert_eq!(message.author_username, "testuser");

        let fetched = db.get_message(message.id).unwrap().unwrap();
        assert_eq!(fetched, message);
        assert_eq!(db.message_count(uid).unwrap(), 1);
    }

    #[test]
    fn text_length_is_bounded() {
        let (db, uid) = db_with_user();

        assert!(db.create_message(uid, "   ").unwrap_err().is_validation());
        assert!(db.create_message(uid, &"x".repeat(141)).unwrap_err().is_validation());
        // counted in characters, not bytes
        assert!(db.create_message(uid, &"é".repeat(140)).is_ok());
    }

    #[test]
    fn messages_for_user_are_newest_first() {
        let (db, uid) = db_with_user();
        let first = db.create_message(uid, "first").unwrap();
        let second = db.create_message(uid, "second").unwrap();

        let ids: Vec<_> = db.messages_for_user(uid, 100).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, [second.id, first.id]);

        assert_eq!(db.messages_for_user(uid, 1).unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_only_that_message() {
        let (db, uid) = db_with_user();
        let keep = db.create_message(uid, "keep").unwrap();
        let gone = db.create_message(uid, "gone").unwrap();

        assert!(db.delete_message(gone.id).unwrap());
        assert!(!db.delete_message(gone.id).unwrap());
        assert!(db.get_message(gone.id).unwrap().is_none());
        assert!(db.get_message(keep.id).unwrap().is_some());
    }

    #[test]
    fn timeline_covers_self_and_followed_only() {
        let (db, me) = db_with_user();
        let friend = db.signup("friend", "f@test.com", "secret", None).unwrap().id;
        let stranger = db.signup("stranger", "s@test.com", "secret", None).unwrap().id;
        db.follow(me, friend).unwrap();

        db.create_message(me, "mine").unwrap();
        db.create_message(friend, "theirs").unwrap();
        db.create_message(stranger, "noise").unwrap();

        let texts: Vec<_> = db.timeline(me, 100).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, ["theirs", "mine"]);
    }

    #[test]
    fn deleting_the_author_deletes_their_messages() {
        let (db, uid) = db_with_user();
        let message = db.create_message(uid, "bye").unwrap();

        db.delete_user(uid).unwrap();
        assert!(db.get_message(message.id).unwrap().is_none());
    }
}
