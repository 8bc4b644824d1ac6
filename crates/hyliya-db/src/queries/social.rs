use anyhow::Result;

use crate::Database;
use crate::models::{CommentRow, PostRow, ProfileLiteRow, StoryRow};

impl Database {
    pub fn create_post(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        image_url: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, content, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, author_id, content, image_url, now],
            )?;
            Ok(())
        })
    }

    /// Author-only delete. Returns false when the post doesn't exist or
    /// belongs to someone else.
    pub fn delete_post(&self, post_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND author_id = ?2",
                [post_id, author_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Global timeline, newest first, with author and engagement counts.
    /// `liked_by_me` is computed for the viewing user.
    pub fn feed(&self, viewer_id: &str, limit: u32, before: Option<&str>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.id, {lite}, p.content, p.image_url,
                        (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id),
                        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
                        EXISTS(SELECT 1 FROM post_likes pl
                               WHERE pl.post_id = p.id AND pl.user_id = ?1),
                        p.created_at
                 FROM posts p
                 JOIN profiles u ON u.id = p.author_id
                 WHERE (?3 IS NULL OR p.created_at < ?3)
                 ORDER BY p.created_at DESC
                 LIMIT ?2",
                lite = ProfileLiteRow::columns("u"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, limit, before], |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        author: ProfileLiteRow::from_row(row, 1)?,
                        content: row.get(7)?,
                        image_url: row.get(8)?,
                        like_count: row.get(9)?,
                        comment_count: row.get(10)?,
                        liked_by_me: row.get(11)?,
                        created_at: row.get(12)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Toggle a like: removes if present, inserts if not.
    /// Returns None when the post doesn't exist, otherwise Some(added).
    pub fn toggle_like(&self, post_id: &str, user_id: &str, now: &str) -> Result<Option<bool>> {
        self.with_tx(|tx| {
            let post_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
                [post_id],
                |row| row.get(0),
            )?;
            if !post_exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                [post_id, user_id],
            )?;
            if removed > 0 {
                return Ok(Some(false));
            }

            tx.execute(
                "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, user_id, now],
            )?;
            Ok(Some(true))
        })
    }

    /// Returns false when the post doesn't exist.
    pub fn create_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        content: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_tx(|tx| {
            let post_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
                [post_id],
                |row| row.get(0),
            )?;
            if !post_exists {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, post_id, author_id, content, now],
            )?;
            Ok(true)
        })
    }

    /// Oldest first, the order a comment thread reads in.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.post_id, {lite}, c.content, c.created_at
                 FROM comments c
                 JOIN profiles u ON u.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at, c.id",
                lite = ProfileLiteRow::columns("u"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author: ProfileLiteRow::from_row(row, 2)?,
                        content: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn create_story(
        &self,
        id: &str,
        author_id: &str,
        media_url: &str,
        now: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO stories (id, author_id, media_url, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, author_id, media_url, now, expires_at],
            )?;
            Ok(())
        })
    }

    /// Unexpired stories, newest first.
    pub fn list_stories(&self, now: &str) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT s.id, {lite}, s.media_url, s.created_at, s.expires_at
                 FROM stories s
                 JOIN profiles u ON u.id = s.author_id
                 WHERE s.expires_at > ?1
                 ORDER BY s.created_at DESC",
                lite = ProfileLiteRow::columns("u"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([now], |row| {
                    Ok(StoryRow {
                        id: row.get(0)?,
                        author: ProfileLiteRow::from_row(row, 1)?,
                        media_url: row.get(7)?,
                        created_at: row.get(8)?,
                        expires_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn sweep_expired_stories(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM stories WHERE expires_at <= ?1", [now])?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts;
    use chrono::{Duration, TimeZone, Utc};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ua", "an", "h", "An").unwrap();
        db.create_user("ub", "binh", "h", "Bình").unwrap();
        db
    }

    fn t(secs: i64) -> String {
        ts(Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap() + Duration::seconds(secs))
    }

    #[test]
    fn feed_carries_counts_and_viewer_like() {
        let db = db();
        db.create_post("p1", "ua", "bài đầu tiên", None, &t(0)).unwrap();
        db.create_post("p2", "ub", "bài thứ hai", Some("http://img"), &t(1)).unwrap();

        db.toggle_like("p1", "ub", &t(2)).unwrap();
        db.create_comment("c1", "p1", "ub", "hay quá", &t(3)).unwrap();

        let feed = db.feed("ub", 10, None).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].id, "p2");

        let p1 = &feed[1];
        assert_eq!(p1.like_count, 1);
        assert_eq!(p1.comment_count, 1);
        assert!(p1.liked_by_me);
        assert_eq!(p1.author.display_name, "An");

        let feed_for_author = db.feed("ua", 10, None).unwrap();
        assert!(!feed_for_author[1].liked_by_me);
    }

    #[test]
    fn like_toggles_on_and_off() {
        let db = db();
        db.create_post("p1", "ua", "nội dung", None, &t(0)).unwrap();

        assert_eq!(db.toggle_like("p1", "ub", &t(1)).unwrap(), Some(true));
        assert_eq!(db.toggle_like("p1", "ub", &t(2)).unwrap(), Some(false));
        assert_eq!(db.toggle_like("ghost", "ub", &t(3)).unwrap(), None);
    }

    #[test]
    fn delete_post_is_author_only() {
        let db = db();
        db.create_post("p1", "ua", "nội dung", None, &t(0)).unwrap();

        assert!(!db.delete_post("p1", "ub").unwrap());
        assert!(db.delete_post("p1", "ua").unwrap());
        assert!(db.feed("ua", 10, None).unwrap().is_empty());
    }

    #[test]
    fn comments_read_oldest_first() {
        let db = db();
        db.create_post("p1", "ua", "nội dung", None, &t(0)).unwrap();
        db.create_comment("c1", "p1", "ub", "một", &t(1)).unwrap();
        db.create_comment("c2", "p1", "ua", "hai", &t(2)).unwrap();

        let comments = db.list_comments("p1").unwrap();
        assert_eq!(comments[0].content, "một");
        assert_eq!(comments[1].content, "hai");

        assert!(!db.create_comment("c3", "ghost", "ua", "?", &t(3)).unwrap());
    }

    #[test]
    fn stories_expire_and_sweep_once() {
        let db = db();
        db.create_story("s1", "ua", "http://m1", &t(0), &t(10)).unwrap();
        db.create_story("s2", "ub", "http://m2", &t(5), &t(100)).unwrap();

        assert_eq!(db.list_stories(&t(6)).unwrap().len(), 2);
        assert_eq!(db.list_stories(&t(50)).unwrap().len(), 1);

        assert_eq!(db.sweep_expired_stories(&t(50)).unwrap(), 1);
        assert_eq!(db.sweep_expired_stories(&t(50)).unwrap(), 0);
        assert_eq!(db.list_stories(&t(6)).unwrap().len(), 1);
    }
}
