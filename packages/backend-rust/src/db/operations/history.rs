use exam_algo::{mastery_level, MasteryLevel};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

#[derive(Debug, Clone)]
pub struct QuestionHistory {
    pub question_id: String,
    pub times_seen: i64,
    pub times_correct: i64,
    pub times_wrong: i64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub total_time_seconds: i64,
    pub average_time_seconds: f64,
    pub mastery: MasteryLevel,
}

/// Count one exposure of a question and reclassify its mastery.
///
/// The counters move in a single upsert; the mastery level is then derived
/// from the returned counters, inside the caller's transaction.
pub async fn record_exposure(
    conn: &mut SqliteConnection,
    user_id: &str,
    question_id: &str,
    is_correct: bool,
    time_taken_seconds: i64,
    now_ms: i64,
) -> Result<QuestionHistory, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "user_question_history" (
            "user_id", "question_id", "times_seen", "times_correct", "times_wrong",
            "first_seen_at", "last_seen_at", "total_time_seconds", "average_time_seconds"
        ) VALUES (?, ?, 1, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("user_id", "question_id") DO UPDATE SET
            "times_seen" = "times_seen" + 1,
            "times_correct" = "times_correct" + excluded."times_correct",
            "times_wrong" = "times_wrong" + excluded."times_wrong",
            "last_seen_at" = excluded."last_seen_at",
            "total_time_seconds" = "total_time_seconds" + excluded."total_time_seconds",
            "average_time_seconds" = CAST("total_time_seconds" + excluded."total_time_seconds" AS REAL)
                / ("times_seen" + 1)
        RETURNING "question_id", "times_seen", "times_correct", "times_wrong", "first_seen_at",
                  "last_seen_at", "total_time_seconds", "average_time_seconds"
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .bind(i64::from(is_correct))
    .bind(i64::from(!is_correct))
    .bind(now_ms)
    .bind(now_ms)
    .bind(time_taken_seconds)
    .bind(time_taken_seconds as f64)
    .fetch_one(&mut *conn)
    .await?;

    let times_seen: i64 = row.try_get("times_seen")?;
    let times_correct: i64 = row.try_get("times_correct")?;
    let mastery = mastery_level(clamp_u32(times_seen), clamp_u32(times_correct));

    sqlx::query(
        r#"UPDATE "user_question_history" SET "mastery_level" = ? WHERE "user_id" = ? AND "question_id" = ?"#,
    )
    .bind(mastery.as_str())
    .bind(user_id)
    .bind(question_id)
    .execute(&mut *conn)
    .await?;

    Ok(QuestionHistory {
        question_id: row.try_get("question_id")?,
        times_seen,
        times_correct,
        times_wrong: row.try_get("times_wrong")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
        total_time_seconds: row.try_get("total_time_seconds")?,
        average_time_seconds: row.try_get("average_time_seconds")?,
        mastery,
    })
}

pub async fn get_history(
    pool: &SqlitePool,
    user_id: &str,
    question_id: &str,
) -> Result<Option<QuestionHistory>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "question_id", "times_seen", "times_correct", "times_wrong", "first_seen_at",
               "last_seen_at", "total_time_seconds", "average_time_seconds", "mastery_level"
        FROM "user_question_history"
        WHERE "user_id" = ? AND "question_id" = ?
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(map_history).transpose()
}

pub async fn list_history(pool: &SqlitePool, user_id: &str) -> Result<Vec<QuestionHistory>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "question_id", "times_seen", "times_correct", "times_wrong", "first_seen_at",
               "last_seen_at", "total_time_seconds", "average_time_seconds", "mastery_level"
        FROM "user_question_history"
        WHERE "user_id" = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_history).collect()
}

pub async fn mastery_distribution(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<(MasteryLevel, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "mastery_level", COUNT(*) AS "count"
        FROM "user_question_history"
        WHERE "user_id" = ?
        GROUP BY "mastery_level"
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let raw: String = row.try_get("mastery_level")?;
            let level = decode_mastery(&raw)?;
            Ok((level, row.try_get("count")?))
        })
        .collect()
}

fn map_history(row: &SqliteRow) -> Result<QuestionHistory, sqlx::Error> {
    let raw: String = row.try_get("mastery_level")?;
    Ok(QuestionHistory {
        question_id: row.try_get("question_id")?,
        times_seen: row.try_get("times_seen")?,
        times_correct: row.try_get("times_correct")?,
        times_wrong: row.try_get("times_wrong")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
        total_time_seconds: row.try_get("total_time_seconds")?,
        average_time_seconds: row.try_get("average_time_seconds")?,
        mastery: decode_mastery(&raw)?,
    })
}

fn decode_mastery(raw: &str) -> Result<MasteryLevel, sqlx::Error> {
    MasteryLevel::parse(raw).ok_or_else(|| sqlx::Error::Decode(format!("invalid mastery_level: {raw}").into()))
}

pub(crate) fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
