use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Version 1: accounts, progress, claims, guarantee requests, photos, chat.
const V1_SCHEMA: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ci TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS progress (
            user_id INTEGER PRIMARY KEY,
            current_step INTEGER NOT NULL CHECK (current_step BETWEEN 0 AND 4),
            completed_tasks TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS insurance_claims (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            rrn_front TEXT NOT NULL,
            rrn_back TEXT NOT NULL,
            address TEXT NOT NULL,
            job TEXT NOT NULL,
            accident_date TEXT NOT NULL,
            accident_location TEXT NOT NULL,
            accident_type TEXT NOT NULL,
            accident_desc TEXT NOT NULL,
            injury_part TEXT NOT NULL,
            hospital_name TEXT NOT NULL,
            hospital_location TEXT NOT NULL,
            treatment_type TEXT NOT NULL CHECK (treatment_type IN ('outpatient', 'inpatient')),
            first_visit_date TEXT NOT NULL,
            case_number TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS med_guarantee_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            treatment_method TEXT NOT NULL CHECK (treatment_method IN ('outpatient', 'inpatient')),
            hospital_name TEXT NOT NULL,
            phone_number TEXT,
            fax_number TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS accident_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            storage_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL CHECK (file_size > 0),
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_claims_user_created
            ON insurance_claims (user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_images_case_created
            ON accident_images (case_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_chat_user_created
            ON chat_messages (user_id, created_at);
    ",
];

const MIGRATIONS: &[(i64, &[&str])] = &[(1, V1_SCHEMA)];

/// Applies every migration not yet recorded in `schema_migrations`, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in MIGRATIONS {
        if is_applied(pool, *version).await? {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in *statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(*version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
