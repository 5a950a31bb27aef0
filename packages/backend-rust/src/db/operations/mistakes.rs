use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use super::questions::{map_question, Question};

#[derive(Debug, Clone)]
pub struct Mistake {
    pub question: Question,
    pub exam_session_id: Option<String>,
    pub times_wrong: i64,
    pub first_wrong_at: i64,
    pub last_wrong_at: i64,
    pub reviewed: bool,
    pub reviewed_at: Option<i64>,
    pub marked_for_review: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MistakeFilter<'a> {
    pub topic: Option<&'a str>,
    pub include_reviewed: bool,
}

/// Create or bump a mistake. A bumped mistake is open again.
pub async fn record_mistake(
    conn: &mut SqliteConnection,
    user_id: &str,
    question_id: &str,
    session_id: &str,
    now_ms: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO "user_mistakes" (
            "user_id", "question_id", "exam_session_id", "times_wrong", "first_wrong_at", "last_wrong_at"
        ) VALUES (?, ?, ?, 1, ?, ?)
        ON CONFLICT ("user_id", "question_id") DO UPDATE SET
            "times_wrong" = "times_wrong" + 1,
            "exam_session_id" = excluded."exam_session_id",
            "last_wrong_at" = excluded."last_wrong_at",
            "reviewed" = 0,
            "reviewed_at" = NULL
        RETURNING "times_wrong"
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .bind(session_id)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_one(&mut *conn)
    .await
}

/// Mark an open mistake reviewed; false when there was nothing open.
pub async fn clear_mistake(
    conn: &mut SqliteConnection,
    user_id: &str,
    question_id: &str,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "user_mistakes"
        SET "reviewed" = 1, "reviewed_at" = ?
        WHERE "user_id" = ? AND "question_id" = ? AND "reviewed" = 0
        "#,
    )
    .bind(now_ms)
    .bind(user_id)
    .bind(question_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_mistakes(
    pool: &SqlitePool,
    user_id: &str,
    filter: &MistakeFilter<'_>,
) -> Result<Vec<Mistake>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT m."exam_session_id", m."times_wrong", m."first_wrong_at", m."last_wrong_at",
               m."reviewed", m."reviewed_at", m."marked_for_review",
               q."id", q."question_text", q."option_a", q."option_b", q."option_c", q."option_d",
               q."option_e", q."correct_answer", q."explanation", q."topic", q."subtopic",
               q."difficulty", q."legal_reference", q."quality_score", q."times_shown",
               q."is_active", q."created_at", q."updated_at"
        FROM "user_mistakes" m
        JOIN "questions" q ON q."id" = m."question_id"
        WHERE m."user_id" = "#,
    );
    builder.push_bind(user_id);

    if !filter.include_reviewed {
        builder.push(r#" AND m."reviewed" = 0"#);
    }
    if let Some(topic) = filter.topic {
        builder.push(r#" AND q."topic" = "#);
        builder.push_bind(topic);
    }

    builder.push(r#" ORDER BY m."last_wrong_at" DESC, q."id" ASC"#);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(map_mistake).collect()
}

/// Question ids of open mistakes that are still active in the pool
pub async fn open_mistake_question_ids(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT m."question_id"
        FROM "user_mistakes" m
        JOIN "questions" q ON q."id" = m."question_id"
        WHERE m."user_id" = ? AND m."reviewed" = 0 AND q."is_active" = 1
        ORDER BY m."last_wrong_at" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn count_open_mistakes(pool: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user_mistakes" WHERE "user_id" = ? AND "reviewed" = 0"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn set_marked_for_review(
    pool: &SqlitePool,
    user_id: &str,
    question_id: &str,
    marked: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE "user_mistakes" SET "marked_for_review" = ? WHERE "user_id" = ? AND "question_id" = ?"#,
    )
    .bind(marked)
    .bind(user_id)
    .bind(question_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn map_mistake(row: &SqliteRow) -> Result<Mistake, sqlx::Error> {
    Ok(Mistake {
        question: map_question(row)?,
        exam_session_id: row.try_get("exam_session_id")?,
        times_wrong: row.try_get("times_wrong")?,
        first_wrong_at: row.try_get("first_wrong_at")?,
        last_wrong_at: row.try_get("last_wrong_at")?,
        reviewed: row.try_get("reviewed")?,
        reviewed_at: row.try_get("reviewed_at")?,
        marked_for_review: row.try_get("marked_for_review")?,
    })
}
