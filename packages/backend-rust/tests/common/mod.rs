#![allow(dead_code)]

use exam_algo::Difficulty;
use tempfile::TempDir;

use exam_backend::config::{Config, ExamConfig};
use exam_backend::db::config::DbConfig;
use exam_backend::db::operations::{questions, AnswerOption, NewQuestion};
use exam_backend::db::{now_ms, Database};
use exam_backend::services::ExamService;

pub const CORRECT: &str = "A";
pub const WRONG: &str = "B";

/// File-backed database in a temp dir; the dir lives as long as this value.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

pub async fn create_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = DbConfig::for_path(&dir.path().join("exam.db"));
    let db = Database::connect(&config).await.expect("failed to open test database");
    db.migrate().await.expect("failed to migrate test database");
    TestDb { db, _dir: dir }
}

/// Insert `count` active questions for a topic. Every correct answer is "A".
pub async fn seed_questions(db: &Database, topic: &str, difficulty: Difficulty, count: usize) -> Vec<String> {
    let mut conn = db.pool().acquire().await.expect("failed to acquire connection");
    let mut ids = Vec::with_capacity(count);
    for index in 0..count {
        let id = format!("{topic}-{}-{index:03}", difficulty.as_str());
        let question = NewQuestion {
            id: id.clone(),
            question_text: format!("Question {index} about {topic}?"),
            options: [
                "first".to_string(),
                "second".to_string(),
                "third".to_string(),
                "fourth".to_string(),
                "fifth".to_string(),
            ],
            correct_answer: AnswerOption::A,
            explanation: format!("Explanation for {id}"),
            topic: topic.to_string(),
            subtopic: None,
            difficulty,
            legal_reference: Some("Art. 1".to_string()),
            quality_score: Some(0.8),
        };
        questions::upsert_question(&mut conn, &question, now_ms())
            .await
            .expect("failed to seed question");
        ids.push(id);
    }
    ids
}

pub fn test_exam_config() -> ExamConfig {
    ExamConfig {
        selection_seed: Some(7),
        ..ExamConfig::default()
    }
}

pub fn create_exam_service(db: &Database) -> ExamService {
    ExamService::new(db.clone(), test_exam_config())
}

pub fn test_config(admin_api_key: Option<&str>) -> Config {
    Config {
        admin_api_key: admin_api_key.map(str::to_string),
        exam: test_exam_config(),
        ..Config::default()
    }
}
