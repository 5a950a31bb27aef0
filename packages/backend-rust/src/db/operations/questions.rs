use exam_algo::Difficulty;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

/// One of the five answer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
    E,
}

impl AnswerOption {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
            AnswerOption::E => "E",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub options: [String; 5],
    pub correct_answer: AnswerOption,
    pub explanation: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub legal_reference: Option<String>,
    pub quality_score: Option<f64>,
    pub times_shown: i64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Question as written by the generation batch
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub id: String,
    pub question_text: String,
    pub options: [String; 5],
    pub correct_answer: AnswerOption,
    pub explanation: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub legal_reference: Option<String>,
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    /// Empty means every topic
    pub topics: Vec<String>,
    pub difficulty: Option<Difficulty>,
    /// Restrict to these ids (review mode)
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub difficulty: Difficulty,
    pub count: i64,
}

const QUESTION_COLUMNS: &str = r#""id", "question_text", "option_a", "option_b", "option_c", "option_d", "option_e",
    "correct_answer", "explanation", "topic", "subtopic", "difficulty", "legal_reference",
    "quality_score", "times_shown", "is_active", "created_at", "updated_at""#;

pub async fn list_active_questions(
    pool: &SqlitePool,
    filter: &QuestionFilter,
) -> Result<Vec<Question>, sqlx::Error> {
    if matches!(&filter.ids, Some(ids) if ids.is_empty()) {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    builder.push(QUESTION_COLUMNS);
    builder.push(r#" FROM "questions" WHERE "is_active" = 1"#);

    if !filter.topics.is_empty() {
        builder.push(r#" AND "topic" IN ("#);
        let mut separated = builder.separated(", ");
        for topic in &filter.topics {
            separated.push_bind(topic.as_str());
        }
        separated.push_unseparated(")");
    }

    if let Some(difficulty) = filter.difficulty {
        builder.push(r#" AND "difficulty" = "#);
        builder.push_bind(difficulty.as_str());
    }

    if let Some(ids) = &filter.ids {
        builder.push(r#" AND "id" IN ("#);
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
    }

    builder.push(r#" ORDER BY "id""#);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(map_question).collect()
}

pub async fn get_question<'e, E>(executor: E, id: &str) -> Result<Option<Question>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {QUESTION_COLUMNS} FROM "questions" WHERE "id" = ? LIMIT 1"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(map_question).transpose()
}

/// Bump the served counter for every id; returns rows touched.
pub async fn increment_times_shown(pool: &SqlitePool, ids: &[String]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(r#"UPDATE "questions" SET "times_shown" = "times_shown" + 1 WHERE "id" IN ("#);
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Insert or replace question content. Returns true when the row is new.
///
/// `times_shown`, `created_at` and `is_active` survive a replace, so a
/// deactivated question stays deactivated when it is imported again.
pub async fn upsert_question(
    conn: &mut SqliteConnection,
    question: &NewQuestion,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let existed: Option<i64> = sqlx::query_scalar(r#"SELECT 1 FROM "questions" WHERE "id" = ?"#)
        .bind(&question.id)
        .fetch_optional(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO "questions" (
            "id", "question_text", "option_a", "option_b", "option_c", "option_d", "option_e",
            "correct_answer", "explanation", "topic", "subtopic", "difficulty", "legal_reference",
            "quality_score", "times_shown", "is_active", "created_at", "updated_at"
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
            "question_text" = excluded."question_text",
            "option_a" = excluded."option_a",
            "option_b" = excluded."option_b",
            "option_c" = excluded."option_c",
            "option_d" = excluded."option_d",
            "option_e" = excluded."option_e",
            "correct_answer" = excluded."correct_answer",
            "explanation" = excluded."explanation",
            "topic" = excluded."topic",
            "subtopic" = excluded."subtopic",
            "difficulty" = excluded."difficulty",
            "legal_reference" = excluded."legal_reference",
            "quality_score" = excluded."quality_score",
            "updated_at" = excluded."updated_at"
        "#,
    )
    .bind(&question.id)
    .bind(&question.question_text)
    .bind(&question.options[0])
    .bind(&question.options[1])
    .bind(&question.options[2])
    .bind(&question.options[3])
    .bind(&question.options[4])
    .bind(question.correct_answer.as_str())
    .bind(&question.explanation)
    .bind(&question.topic)
    .bind(&question.subtopic)
    .bind(question.difficulty.as_str())
    .bind(&question.legal_reference)
    .bind(question.quality_score)
    .bind(now_ms)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;

    Ok(existed.is_none())
}

/// Soft delete. Returns false when the id is unknown.
pub async fn deactivate_question(pool: &SqlitePool, id: &str, now_ms: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"UPDATE "questions" SET "is_active" = 0, "updated_at" = ? WHERE "id" = ?"#)
        .bind(now_ms)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Active question counts per (topic, difficulty)
pub async fn topic_catalogue(pool: &SqlitePool) -> Result<Vec<TopicCount>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "topic", "difficulty", COUNT(*) AS "count"
        FROM "questions"
        WHERE "is_active" = 1
        GROUP BY "topic", "difficulty"
        ORDER BY "topic", "difficulty"
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(TopicCount {
                topic: row.try_get("topic")?,
                difficulty: decode_difficulty(row.try_get("difficulty")?)?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

pub(crate) fn map_question(row: &SqliteRow) -> Result<Question, sqlx::Error> {
    let correct_raw: String = row.try_get("correct_answer")?;
    let correct_answer = AnswerOption::parse(&correct_raw)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid correct_answer: {correct_raw}").into()))?;

    Ok(Question {
        id: row.try_get("id")?,
        question_text: row.try_get("question_text")?,
        options: [
            row.try_get("option_a")?,
            row.try_get("option_b")?,
            row.try_get("option_c")?,
            row.try_get("option_d")?,
            row.try_get("option_e")?,
        ],
        correct_answer,
        explanation: row.try_get("explanation")?,
        topic: row.try_get("topic")?,
        subtopic: row.try_get("subtopic")?,
        difficulty: decode_difficulty(row.try_get("difficulty")?)?,
        legal_reference: row.try_get("legal_reference")?,
        quality_score: row.try_get("quality_score")?,
        times_shown: row.try_get("times_shown")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_difficulty(raw: String) -> Result<Difficulty, sqlx::Error> {
    Difficulty::parse(&raw).ok_or_else(|| sqlx::Error::Decode(format!("invalid difficulty: {raw}").into()))
}
