use exam_algo::{accuracy_percent, strength_level, StrengthLevel};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::answer_log::TopicTally;
use super::history::clamp_u32;

#[derive(Debug, Clone)]
pub struct TopicPerformance {
    pub topic: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub accuracy_percentage: f64,
    pub total_time_seconds: i64,
    pub average_time_seconds: f64,
    pub last_practiced_at: i64,
    pub strength: StrengthLevel,
}

/// Fold one session's tally for a topic into the user's aggregate, then
/// reclassify accuracy and strength from the new counters.
pub async fn apply_topic_tally(
    conn: &mut SqliteConnection,
    user_id: &str,
    tally: &TopicTally,
    now_ms: i64,
) -> Result<TopicPerformance, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "user_topic_performance" (
            "user_id", "topic", "total_questions", "correct_answers", "wrong_answers",
            "total_time_seconds", "average_time_seconds", "last_practiced_at"
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("user_id", "topic") DO UPDATE SET
            "total_questions" = "total_questions" + excluded."total_questions",
            "correct_answers" = "correct_answers" + excluded."correct_answers",
            "wrong_answers" = "wrong_answers" + excluded."wrong_answers",
            "total_time_seconds" = "total_time_seconds" + excluded."total_time_seconds",
            "average_time_seconds" = CAST("total_time_seconds" + excluded."total_time_seconds" AS REAL)
                / MAX("total_questions" + excluded."total_questions", 1),
            "last_practiced_at" = excluded."last_practiced_at"
        RETURNING "total_questions", "correct_answers", "wrong_answers", "total_time_seconds",
                  "average_time_seconds", "last_practiced_at"
        "#,
    )
    .bind(user_id)
    .bind(&tally.topic)
    .bind(tally.answered)
    .bind(tally.correct)
    .bind(tally.wrong)
    .bind(tally.time_seconds)
    .bind(average(tally.time_seconds, tally.answered))
    .bind(now_ms)
    .fetch_one(&mut *conn)
    .await?;

    let total_questions: i64 = row.try_get("total_questions")?;
    let correct_answers: i64 = row.try_get("correct_answers")?;
    let accuracy = accuracy_percent(clamp_u32(correct_answers), clamp_u32(total_questions));
    let strength = strength_level(accuracy);

    sqlx::query(
        r#"
        UPDATE "user_topic_performance"
        SET "accuracy_percentage" = ?, "strength_level" = ?
        WHERE "user_id" = ? AND "topic" = ?
        "#,
    )
    .bind(accuracy)
    .bind(strength.as_str())
    .bind(user_id)
    .bind(&tally.topic)
    .execute(&mut *conn)
    .await?;

    Ok(TopicPerformance {
        topic: tally.topic.clone(),
        total_questions,
        correct_answers,
        wrong_answers: row.try_get("wrong_answers")?,
        accuracy_percentage: accuracy,
        total_time_seconds: row.try_get("total_time_seconds")?,
        average_time_seconds: row.try_get("average_time_seconds")?,
        last_practiced_at: row.try_get("last_practiced_at")?,
        strength,
    })
}

pub async fn list_topics(pool: &SqlitePool, user_id: &str) -> Result<Vec<TopicPerformance>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "topic", "total_questions", "correct_answers", "wrong_answers", "accuracy_percentage",
               "total_time_seconds", "average_time_seconds", "last_practiced_at", "strength_level"
        FROM "user_topic_performance"
        WHERE "user_id" = ?
        ORDER BY "accuracy_percentage" ASC, "topic" ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(map_topic).collect()
}

fn map_topic(row: &SqliteRow) -> Result<TopicPerformance, sqlx::Error> {
    let raw: String = row.try_get("strength_level")?;
    Ok(TopicPerformance {
        topic: row.try_get("topic")?,
        total_questions: row.try_get("total_questions")?,
        correct_answers: row.try_get("correct_answers")?,
        wrong_answers: row.try_get("wrong_answers")?,
        accuracy_percentage: row.try_get("accuracy_percentage")?,
        total_time_seconds: row.try_get("total_time_seconds")?,
        average_time_seconds: row.try_get("average_time_seconds")?,
        last_practiced_at: row.try_get("last_practiced_at")?,
        strength: StrengthLevel::parse(&raw)
            .ok_or_else(|| sqlx::Error::Decode(format!("invalid strength_level: {raw}").into()))?,
    })
}

fn average(total: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    total as f64 / count as f64
}
