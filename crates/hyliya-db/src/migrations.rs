use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE profiles (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                bio             TEXT,
                gender          TEXT,
                birthdate       TEXT,
                city            TEXT,
                interests       TEXT NOT NULL DEFAULT '[]',
                avatar_url      TEXT,
                is_fake         INTEGER NOT NULL DEFAULT 0,
                is_premium      INTEGER NOT NULL DEFAULT 0,
                premium_expires TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE swipes (
                swiper_id   TEXT NOT NULL REFERENCES profiles(id),
                target_id   TEXT NOT NULL REFERENCES profiles(id),
                liked       INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (swiper_id, target_id)
            );

            -- Participants are stored as a canonical ordered pair
            -- (user_low < user_high); the UNIQUE constraint is what makes
            -- concurrent match attempts converge on one conversation.
            CREATE TABLE conversations (
                id              TEXT PRIMARY KEY,
                user_low        TEXT NOT NULL REFERENCES profiles(id),
                user_high       TEXT NOT NULL REFERENCES profiles(id),
                origin          TEXT NOT NULL DEFAULT 'direct',
                last_message    TEXT,
                last_message_at TEXT,
                created_at      TEXT NOT NULL,
                UNIQUE (user_low, user_high)
            );

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id       TEXT NOT NULL REFERENCES profiles(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES profiles(id),
                content     TEXT NOT NULL,
                image_url   TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            CREATE TABLE post_likes (
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES profiles(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES profiles(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE stories (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES profiles(id),
                media_url   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_stories_expiry ON stories(expires_at);

            CREATE TABLE friend_requests (
                from_id     TEXT NOT NULL REFERENCES profiles(id),
                to_id       TEXT NOT NULL REFERENCES profiles(id),
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  TEXT NOT NULL,
                accepted_at TEXT,
                PRIMARY KEY (from_id, to_id)
            );

            CREATE TABLE stranger_queue (
                user_id         TEXT PRIMARY KEY REFERENCES profiles(id),
                status          TEXT NOT NULL DEFAULT 'waiting',
                conversation_id TEXT,
                joined_at       TEXT NOT NULL
            );

            CREATE TABLE invoices (
                order_code   INTEGER PRIMARY KEY,
                user_id      TEXT NOT NULL REFERENCES profiles(id),
                package_id   TEXT NOT NULL,
                amount       INTEGER NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending',
                checkout_url TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                paid_at      TEXT
            );

            CREATE INDEX idx_invoices_user ON invoices(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        seed_personas(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Seeded personas that populate discovery before the app has real users.
/// Same shape as real profiles; the empty password hash means they can never
/// authenticate.
fn seed_personas(conn: &Connection) -> Result<()> {
    let personas: &[(&str, &str, &str, &str, &str, &str)] = &[
        (
            "00000000-0000-0000-0000-0000000000a1",
            "linh.hn",
            "Linh",
            "female",
            "Hà Nội",
            "Thích cà phê trứng và đi bộ quanh Hồ Tây",
        ),
        (
            "00000000-0000-0000-0000-0000000000a2",
            "mai.sgn",
            "Mai",
            "female",
            "TP. Hồ Chí Minh",
            "Mê phim Ghibli, đang học guitar",
        ),
        (
            "00000000-0000-0000-0000-0000000000a3",
            "trang.dn",
            "Trang",
            "female",
            "Đà Nẵng",
            "Chạy bộ buổi sáng dọc biển Mỹ Khê",
        ),
        (
            "00000000-0000-0000-0000-0000000000a4",
            "minh.hn",
            "Minh",
            "male",
            "Hà Nội",
            "Dev ban ngày, đầu bếp ban đêm",
        ),
        (
            "00000000-0000-0000-0000-0000000000a5",
            "huy.sgn",
            "Huy",
            "male",
            "TP. Hồ Chí Minh",
            "Thích leo núi và nhiếp ảnh phim",
        ),
        (
            "00000000-0000-0000-0000-0000000000a6",
            "phuong.ct",
            "Phương",
            "female",
            "Cần Thơ",
            "Yêu chợ nổi và ẩm thực miền Tây",
        ),
    ];

    for (id, username, name, gender, city, bio) in personas {
        conn.execute(
            "INSERT OR IGNORE INTO profiles
                (id, username, password, display_name, bio, gender, city, is_fake)
             VALUES (?1, ?2, '', ?3, ?4, ?5, ?6, 1)",
            rusqlite::params![id, username, name, bio, gender, city],
        )?;
    }

    Ok(())
}
