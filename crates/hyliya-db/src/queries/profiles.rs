use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::Database;
use crate::models::ProfileRow;

/// Optional fields applied by a profile update. `None` leaves the stored
/// value untouched.
#[derive(Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub city: Option<String>,
    pub interests: Option<String>,
    pub avatar_url: Option<String>,
}

const PROFILE_COLUMNS: &str = "id, username, password, display_name, bio, gender, birthdate, \
     city, interests, avatar_url, is_fake, is_premium, premium_expires, created_at";

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, password, display_name) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_profile_by_username(&self, username: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "username", username))
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "id", id))
    }

    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET
                    display_name = COALESCE(?2, display_name),
                    bio          = COALESCE(?3, bio),
                    gender       = COALESCE(?4, gender),
                    birthdate    = COALESCE(?5, birthdate),
                    city         = COALESCE(?6, city),
                    interests    = COALESCE(?7, interests),
                    avatar_url   = COALESCE(?8, avatar_url)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.display_name,
                    update.bio,
                    update.gender,
                    update.birthdate,
                    update.city,
                    update.interests,
                    update.avatar_url,
                ],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    // `column` is always a literal from this module, never user input.
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                display_name: row.get(3)?,
                bio: row.get(4)?,
                gender: row.get(5)?,
                birthdate: row.get(6)?,
                city: row.get(7)?,
                interests: row.get(8)?,
                avatar_url: row.get(9)?,
                is_fake: row.get(10)?,
                is_premium: row.get(11)?,
                premium_expires: row.get(12)?,
                created_at: row.get(13)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_and_fetch_user() {
        let db = db();
        db.create_user("u1", "an.nguyen", "hash", "An").unwrap();

        let by_name = db.get_profile_by_username("an.nguyen").unwrap().unwrap();
        assert_eq!(by_name.id, "u1");
        assert_eq!(by_name.display_name, "An");
        assert!(!by_name.is_fake);
        assert!(!by_name.is_premium);

        assert!(db.get_profile("u1").unwrap().is_some());
        assert!(db.get_profile("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = db();
        db.create_user("u1", "an.nguyen", "hash", "An").unwrap();
        assert!(db.create_user("u2", "an.nguyen", "hash", "An Khác").is_err());
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let db = db();
        db.create_user("u1", "an.nguyen", "hash", "An").unwrap();

        let updated = db
            .update_profile(
                "u1",
                &ProfileUpdate {
                    bio: Some("Xin chào".into()),
                    city: Some("Huế".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated);

        let p = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(p.bio.as_deref(), Some("Xin chào"));
        assert_eq!(p.city.as_deref(), Some("Huế"));
        assert_eq!(p.display_name, "An");
    }

    #[test]
    fn seeded_personas_present_and_unloginable() {
        let db = db();
        let p = db.get_profile_by_username("linh.hn").unwrap().unwrap();
        assert!(p.is_fake);
        assert!(p.password.is_empty());
    }
}
