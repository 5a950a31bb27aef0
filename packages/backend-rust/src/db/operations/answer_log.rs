use sqlx::{Row, SqliteConnection};

#[derive(Debug, Clone)]
pub struct LoggedAnswer {
    pub question_id: String,
    pub is_correct: bool,
}

/// Per-topic totals of a session's logged answers
#[derive(Debug, Clone, PartialEq)]
pub struct TopicTally {
    pub topic: String,
    pub answered: i64,
    pub correct: i64,
    pub wrong: i64,
    pub time_seconds: i64,
}

/// Append an answer. A second answer for the same (session, question) is a
/// unique violation.
pub async fn insert_answer(
    conn: &mut SqliteConnection,
    user_id: &str,
    session_id: &str,
    question_id: &str,
    is_correct: bool,
    time_taken_seconds: i64,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "answer_log" (
            "user_id", "session_id", "question_id", "is_correct", "time_taken_seconds", "answered_at"
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(session_id)
    .bind(question_id)
    .bind(is_correct)
    .bind(time_taken_seconds)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn session_answers(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<LoggedAnswer>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "question_id", "is_correct" FROM "answer_log" WHERE "session_id" = ? ORDER BY "id""#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(LoggedAnswer {
                question_id: row.try_get("question_id")?,
                is_correct: row.try_get("is_correct")?,
            })
        })
        .collect()
}

pub async fn session_topic_tallies(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<TopicTally>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT q."topic" AS "topic",
               COUNT(*) AS "answered",
               SUM(CASE WHEN l."is_correct" = 1 THEN 1 ELSE 0 END) AS "correct",
               SUM(CASE WHEN l."is_correct" = 1 THEN 0 ELSE 1 END) AS "wrong",
               SUM(l."time_taken_seconds") AS "time_seconds"
        FROM "answer_log" l
        JOIN "questions" q ON q."id" = l."question_id"
        WHERE l."session_id" = ?
        GROUP BY q."topic"
        ORDER BY q."topic"
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(TopicTally {
                topic: row.try_get("topic")?,
                answered: row.try_get("answered")?,
                correct: row.try_get("correct")?,
                wrong: row.try_get("wrong")?,
                time_seconds: row.try_get("time_seconds")?,
            })
        })
        .collect()
}
