use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};

use super::questions::{map_question, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    Practice,
    FullSimulation,
    ReviewMistakes,
}

impl ExamType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "practice" => Some(Self::Practice),
            "full_simulation" => Some(Self::FullSimulation),
            "review_mistakes" => Some(Self::ReviewMistakes),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ExamType::Practice => "practice",
            ExamType::FullSimulation => "full_simulation",
            ExamType::ReviewMistakes => "review_mistakes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    pub id: String,
    pub user_id: String,
    pub exam_type: ExamType,
    pub status: SessionStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub last_activity_at: i64,
    pub requested_questions: i64,
    pub total_questions: i64,
    pub answered_count: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub score_percentage: Option<f64>,
    pub passed: Option<bool>,
    pub time_limit_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub exam_type: ExamType,
    pub requested_questions: i64,
    pub time_limit_seconds: Option<i64>,
    pub started_at: i64,
}

/// Pre-allocated answer slot of a session
#[derive(Debug, Clone)]
pub struct AnswerSlot {
    pub question_id: String,
    pub order_index: i64,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub time_spent_seconds: Option<i64>,
    pub flagged: bool,
    pub answered_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SlotWithQuestion {
    pub slot: AnswerSlot,
    pub question: Question,
}

#[derive(Debug, Clone, Default)]
pub struct CompletedStats {
    pub completed: i64,
    pub passed: i64,
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
}

const SESSION_COLUMNS: &str = r#""id", "user_id", "exam_type", "status", "started_at", "ended_at",
    "last_activity_at", "requested_questions", "total_questions", "answered_count",
    "correct_count", "wrong_count", "score_percentage", "passed", "time_limit_seconds""#;

/// Insert a session in progress together with its ordered answer slots.
///
/// Fails with a unique violation when the user already has a session in
/// progress.
pub async fn insert_session(
    conn: &mut SqliteConnection,
    session: &NewSession<'_>,
    question_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "exam_sessions" (
            "id", "user_id", "exam_type", "status", "started_at", "last_activity_at",
            "requested_questions", "total_questions", "time_limit_seconds"
        ) VALUES (?, ?, ?, 'in_progress', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.exam_type.as_str())
    .bind(session.started_at)
    .bind(session.started_at)
    .bind(session.requested_questions)
    .bind(question_ids.len() as i64)
    .bind(session.time_limit_seconds)
    .execute(&mut *conn)
    .await?;

    for (index, question_id) in question_ids.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "answered_questions" ("session_id", "question_id", "order_index")
            VALUES (?, ?, ?)
            "#,
        )
        .bind(session.id)
        .bind(question_id)
        .bind(index as i64 + 1)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn get_session<'e, E>(executor: E, id: &str) -> Result<Option<ExamSession>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {SESSION_COLUMNS} FROM "exam_sessions" WHERE "id" = ? LIMIT 1"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(map_session).transpose()
}

pub async fn active_session_id(pool: &SqlitePool, user_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT "id" FROM "exam_sessions" WHERE "user_id" = ? AND "status" = 'in_progress' LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_user_sessions(
    pool: &SqlitePool,
    user_id: &str,
    status: Option<SessionStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {SESSION_COLUMNS} FROM "exam_sessions"
        WHERE "user_id" = ? AND (? IS NULL OR "status" = ?)
        ORDER BY "started_at" DESC, "id" DESC
        LIMIT ? OFFSET ?
        "#
    );
    let status = status.map(SessionStatus::as_str);
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    rows.iter().map(map_session).collect()
}

pub async fn count_user_sessions(
    pool: &SqlitePool,
    user_id: &str,
    status: Option<SessionStatus>,
) -> Result<i64, sqlx::Error> {
    let status = status.map(SessionStatus::as_str);
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "exam_sessions" WHERE "user_id" = ? AND (? IS NULL OR "status" = ?)"#,
    )
    .bind(user_id)
    .bind(status)
    .bind(status)
    .fetch_one(pool)
    .await
}

pub async fn get_slot(
    pool: &SqlitePool,
    session_id: &str,
    question_id: &str,
) -> Result<Option<AnswerSlot>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "question_id", "order_index", "user_answer", "is_correct", "time_spent_seconds",
               "flagged", "answered_at"
        FROM "answered_questions"
        WHERE "session_id" = ? AND "question_id" = ?
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(map_slot).transpose()
}

/// Slots of a session in order, each joined with its question.
pub async fn list_session_questions(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<SlotWithQuestion>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT aq."question_id", aq."order_index", aq."user_answer", aq."is_correct",
               aq."time_spent_seconds", aq."flagged", aq."answered_at",
               q."id", q."question_text", q."option_a", q."option_b", q."option_c", q."option_d",
               q."option_e", q."correct_answer", q."explanation", q."topic", q."subtopic",
               q."difficulty", q."legal_reference", q."quality_score", q."times_shown",
               q."is_active", q."created_at", q."updated_at"
        FROM "answered_questions" aq
        JOIN "questions" q ON q."id" = aq."question_id"
        WHERE aq."session_id" = ?
        ORDER BY aq."order_index"
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SlotWithQuestion {
                slot: map_slot(row)?,
                question: map_question(row)?,
            })
        })
        .collect()
}

/// Bump the running counters of a session still in progress and return the
/// new answered count, or `None` when the session is not in progress.
///
/// Must be the first statement of an answer transaction so concurrent
/// writers queue on the write lock before any read.
pub async fn bump_answer_counters(
    conn: &mut SqliteConnection,
    session_id: &str,
    is_correct: bool,
    now_ms: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        UPDATE "exam_sessions"
        SET "answered_count" = "answered_count" + 1,
            "correct_count" = "correct_count" + ?,
            "wrong_count" = "wrong_count" + ?,
            "last_activity_at" = ?
        WHERE "id" = ? AND "status" = 'in_progress'
        RETURNING "answered_count"
        "#,
    )
    .bind(i64::from(is_correct))
    .bind(i64::from(!is_correct))
    .bind(now_ms)
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Write-once fill of an answer slot; false when it was already answered
/// or does not exist.
pub async fn fill_answer_slot(
    conn: &mut SqliteConnection,
    session_id: &str,
    question_id: &str,
    user_answer: &str,
    is_correct: bool,
    time_spent_seconds: i64,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "answered_questions"
        SET "user_answer" = ?, "is_correct" = ?, "time_spent_seconds" = ?, "answered_at" = ?
        WHERE "session_id" = ? AND "question_id" = ? AND "user_answer" IS NULL
        "#,
    )
    .bind(user_answer)
    .bind(is_correct)
    .bind(time_spent_seconds)
    .bind(now_ms)
    .bind(session_id)
    .bind(question_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Flip an in-progress session to completed; false when it was not in progress.
pub async fn complete_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "status" = 'completed', "ended_at" = ?, "last_activity_at" = ?
        WHERE "id" = ? AND "status" = 'in_progress'
        "#,
    )
    .bind(now_ms)
    .bind(now_ms)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_session_score(
    conn: &mut SqliteConnection,
    session_id: &str,
    score_percentage: f64,
    passed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "exam_sessions" SET "score_percentage" = ?, "passed" = ? WHERE "id" = ?"#)
        .bind(score_percentage)
        .bind(passed)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Flip an in-progress session to abandoned; false when it was not in progress.
pub async fn abandon_session(pool: &SqlitePool, session_id: &str, now_ms: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "status" = 'abandoned', "ended_at" = ?, "last_activity_at" = ?
        WHERE "id" = ? AND "status" = 'in_progress'
        "#,
    )
    .bind(now_ms)
    .bind(now_ms)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Abandon every in-progress session idle since before `cutoff_ms`.
pub async fn abandon_stale_sessions(
    pool: &SqlitePool,
    cutoff_ms: i64,
    now_ms: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "status" = 'abandoned', "ended_at" = ?
        WHERE "status" = 'in_progress' AND "last_activity_at" < ?
        "#,
    )
    .bind(now_ms)
    .bind(cutoff_ms)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Set the review flag of a slot while its session is in progress.
pub async fn set_slot_flag(
    pool: &SqlitePool,
    session_id: &str,
    question_id: &str,
    flagged: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "answered_questions"
        SET "flagged" = ?
        WHERE "session_id" = ? AND "question_id" = ?
          AND EXISTS (
              SELECT 1 FROM "exam_sessions"
              WHERE "id" = ? AND "status" = 'in_progress'
          )
        "#,
    )
    .bind(flagged)
    .bind(session_id)
    .bind(question_id)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Questions answered wrong in the user's most recently completed session.
pub async fn last_completed_wrong_question_ids(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT "question_id" FROM "answered_questions"
        WHERE "is_correct" = 0
          AND "session_id" = (
              SELECT "id" FROM "exam_sessions"
              WHERE "user_id" = ? AND "status" = 'completed'
              ORDER BY "ended_at" DESC, "id" DESC
              LIMIT 1
          )
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn completed_stats(pool: &SqlitePool, user_id: &str) -> Result<CompletedStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS "completed",
               COALESCE(SUM(CASE WHEN "passed" = 1 THEN 1 ELSE 0 END), 0) AS "passed",
               AVG("score_percentage") AS "average_score",
               MAX("score_percentage") AS "best_score"
        FROM "exam_sessions"
        WHERE "user_id" = ? AND "status" = 'completed'
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(CompletedStats {
        completed: row.try_get("completed")?,
        passed: row.try_get("passed")?,
        average_score: row.try_get("average_score")?,
        best_score: row.try_get("best_score")?,
    })
}

fn map_session(row: &SqliteRow) -> Result<ExamSession, sqlx::Error> {
    let exam_type_raw: String = row.try_get("exam_type")?;
    let status_raw: String = row.try_get("status")?;

    Ok(ExamSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        exam_type: ExamType::parse(&exam_type_raw)
            .ok_or_else(|| sqlx::Error::Decode(format!("invalid exam_type: {exam_type_raw}").into()))?,
        status: SessionStatus::parse(&status_raw)
            .ok_or_else(|| sqlx::Error::Decode(format!("invalid status: {status_raw}").into()))?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        last_activity_at: row.try_get("last_activity_at")?,
        requested_questions: row.try_get("requested_questions")?,
        total_questions: row.try_get("total_questions")?,
        answered_count: row.try_get("answered_count")?,
        correct_count: row.try_get("correct_count")?,
        wrong_count: row.try_get("wrong_count")?,
        score_percentage: row.try_get("score_percentage")?,
        passed: row.try_get("passed")?,
        time_limit_seconds: row.try_get("time_limit_seconds")?,
    })
}

fn map_slot(row: &SqliteRow) -> Result<AnswerSlot, sqlx::Error> {
    Ok(AnswerSlot {
        question_id: row.try_get("question_id")?,
        order_index: row.try_get("order_index")?,
        user_answer: row.try_get("user_answer")?,
        is_correct: row.try_get("is_correct")?,
        time_spent_seconds: row.try_get("time_spent_seconds")?,
        flagged: row.try_get("flagged")?,
        answered_at: row.try_get("answered_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_type_round_trip() {
        for exam_type in [ExamType::Practice, ExamType::FullSimulation, ExamType::ReviewMistakes] {
            assert_eq!(ExamType::parse(exam_type.as_str()), Some(exam_type));
        }
        assert_eq!(ExamType::parse("Practice"), None);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }
}
