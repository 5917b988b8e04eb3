use crate::error::Result;
use crate::models::{USER_COLUMNS, User};
use crate::Database;

impl Database {
    // -- Edges --

    /// Insert the edge `follower -> followed`. Returns false if it already
    /// existed. Self-edges are stored like any other.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
                [follower_id, followed_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                [follower_id, followed_id],
            )?;
            Ok(removed > 0)
        })
    }

    // -- Predicates --

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
                [user_id, other_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool> {
        self.is_following(other_id, user_id)
    }

    // -- Collections --

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS}
                 FROM follows f
                 JOIN users u ON u.id = f.followed_id
                 WHERE f.follower_id = ?1
                 ORDER BY u.username"
            ))?;
            let users = stmt
                .query_map([user_id], User::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS}
                 FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.followed_id = ?1
                 ORDER BY u.username"
            ))?;
            let users = stmt
                .query_map([user_id], User::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    pub fn following_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    pub fn follower_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followed_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn two_users(db: &Database) -> (i64, i64) {
        let u1 = db.signup("testuser1", "test1@test.com", "HASHED_PASSWORD", None).unwrap();
        let u2 = db.signup("testuser2", "test2@test.com", "HASHED_PASSWORD", None).unwrap();
        (u1.id, u2.id)
    }

    #[test]
    fn new_user_has_no_followers_and_no_messages() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("testuser", "test@test.com", "HASHED_PASSWORD", None).unwrap();

        assert!(db.followers(user.id).unwrap().is_empty());
        assert_eq!(db.follower_count(user.id).unwrap(), 0);
        assert_eq!(db.message_count(user.id).unwrap(), 0);
    }

    #[test]
    fn edge_makes_both_predicates_true() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);

        assert!(db.follow(u1, u2).unwrap());

        assert!(db.is_following(u1, u2).unwrap());
        assert!(db.is_followed_by(u2, u1).unwrap());
        // direction matters
        assert!(!db.is_following(u2, u1).unwrap());
        assert!(!db.is_followed_by(u1, u2).unwrap());
    }

    #[test]
    fn no_edge_means_both_predicates_false() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);

        assert!(!db.is_following(u1, u2).unwrap());
        assert!(!db.is_followed_by(u2, u1).unwrap());
        assert!(!db.is_following(u1, u1).unwrap());
    }

    #[test]
    fn duplicate_follow_is_a_no_op() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);

        assert!(db.follow(u1, u2).unwrap());
        assert!(!db.follow(u1, u2).unwrap());
        assert_eq!(db.following_count(u1).unwrap(), 1);
    }

    #[test]
    fn unfollow_removes_the_edge() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);

        db.follow(u1, u2).unwrap();
        assert!(db.unfollow(u1, u2).unwrap());
        assert!(!db.unfollow(u1, u2).unwrap());
        assert!(!db.is_following(u1, u2).unwrap());
    }

    #[test]
    fn collections_list_the_other_side() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);
        db.follow(u1, u2).unwrap();

        let following: Vec<_> = db.following(u1).unwrap().into_iter().map(|u| u.id).collect();
        let followers: Vec<_> = db.followers(u2).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(following, [u2]);
        assert_eq!(followers, [u1]);
        assert_eq!(db.follower_count(u2).unwrap(), 1);
    }

    #[test]
    fn explicit_self_follow_is_stored() {
        let db = Database::open_in_memory().unwrap();
        let (u1, _) = two_users(&db);

        assert!(db.follow(u1, u1).unwrap());
        assert!(db.is_following(u1, u1).unwrap());
    }

    #[test]
    fn edges_to_missing_users_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let (u1, _) = two_users(&db);

        assert!(db.follow(u1, 9_999).is_err());
    }

    #[test]
    fn deleting_a_user_drops_their_edges() {
        let db = Database::open_in_memory().unwrap();
        let (u1, u2) = two_users(&db);
        db.follow(u1, u2).unwrap();
        db.follow(u2, u1).unwrap();

        db.delete_user(u2).unwrap();

        assert_eq!(db.following_count(u1).unwrap(), 0);
        assert_eq!(db.follower_count(u1).unwrap(), 0);
    }
}
