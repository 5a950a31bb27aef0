use exam_algo::{Difficulty, MasteryLevel, StrengthLevel};

use exam_backend::db::operations::{history, mistakes, sessions, topics, ExamType, MistakeFilter, SessionStatus};
use exam_backend::services::exam::{AnswerRequest, CreateExamRequest, CreatedExam, FlagRequest, ListExamsQuery};
use exam_backend::services::{EngineError, ExamService};

mod common;

use common::{CORRECT, WRONG};

const USER: &str = "user-1";

fn create_request(exam_type: ExamType, count: Option<u32>) -> CreateExamRequest {
    CreateExamRequest {
        exam_type,
        question_count: count,
        topics: None,
        difficulty: None,
    }
}

fn answer(question_id: &str, user_answer: &str) -> AnswerRequest {
    AnswerRequest {
        question_id: question_id.to_string(),
        user_answer: user_answer.to_string(),
        time_taken_seconds: 30,
    }
}

async fn start_practice(service: &ExamService, user_id: &str, count: u32) -> CreatedExam {
    service
        .create(user_id, &create_request(ExamType::Practice, Some(count)))
        .await
        .expect("failed to create practice exam")
}

#[tokio::test]
async fn test_full_simulation_rejected_when_pool_too_small() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 25).await;
    let service = common::create_exam_service(&test_db.db);

    let result = service
        .create(USER, &create_request(ExamType::FullSimulation, Some(30)))
        .await;

    match result {
        Err(EngineError::InsufficientQuestions { available }) => assert_eq!(available, 25),
        other => panic!("expected InsufficientQuestions, got {other:?}"),
    }

    let count = sessions::count_user_sessions(test_db.db.pool(), USER, None).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_practice_accepts_partial_pool() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 4).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 10).await;

    assert_eq!(created.total_questions, 4);
    assert_eq!(created.requested_questions, 10);
    assert!(created.partial);
    assert!(created.time_limit_seconds.is_none());
}

#[tokio::test]
async fn test_empty_pool_reports_zero_available() {
    let test_db = common::create_test_db().await;
    let service = common::create_exam_service(&test_db.db);

    let result = service.create(USER, &create_request(ExamType::Practice, None)).await;

    assert!(matches!(result, Err(EngineError::InsufficientQuestions { available: 0 })));
}

#[tokio::test]
async fn test_practice_scoring_and_aggregates() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 5).await;
    assert_eq!(created.total_questions, 5);

    for (index, question) in created.questions.iter().enumerate() {
        let choice = if index < 3 { CORRECT } else { WRONG };
        let outcome = service
            .record_answer(USER, &created.exam_id, &answer(&question.question_id, choice))
            .await
            .unwrap();
        assert_eq!(outcome.is_correct, index < 3);
        assert_eq!(outcome.answered_count, index as i64 + 1);
    }

    let result = service.submit(USER, &created.exam_id).await.unwrap();
    assert_eq!(result.score_percentage, 60.0);
    assert!(!result.passed);
    assert_eq!(result.correct_answers, 3);
    assert_eq!(result.wrong_answers, 2);
    assert_eq!(result.unanswered, 0);
    assert_eq!(result.mistakes_recorded, 2);
    assert_eq!(result.weak_topics, vec!["ethics".to_string()]);

    let pool = test_db.db.pool();
    let open = mistakes::list_mistakes(pool, USER, &MistakeFilter::default()).await.unwrap();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|mistake| mistake.times_wrong == 1 && !mistake.reviewed));

    let topic_rows = topics::list_topics(pool, USER).await.unwrap();
    assert_eq!(topic_rows.len(), 1);
    assert_eq!(topic_rows[0].total_questions, 5);
    assert_eq!(topic_rows[0].correct_answers, 3);
    assert_eq!(topic_rows[0].wrong_answers, 2);
    assert_eq!(topic_rows[0].strength, StrengthLevel::Weak);

    let session = sessions::get_session(pool, &created.exam_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.score_percentage, Some(60.0));
    assert_eq!(session.passed, Some(false));
    assert!(session.ended_at.is_some());
}

#[tokio::test]
async fn test_unanswered_questions_count_as_wrong_in_score() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 4).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 4).await;
    let first = &created.questions[0].question_id;
    service
        .record_answer(USER, &created.exam_id, &answer(first, CORRECT))
        .await
        .unwrap();

    let result = service.submit(USER, &created.exam_id).await.unwrap();
    assert_eq!(result.score_percentage, 25.0);
    assert_eq!(result.unanswered, 3);
    assert_eq!(result.mistakes_recorded, 0);
}

#[tokio::test]
async fn test_repeated_mistake_increments_times_wrong() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);
    let target = "ethics-medium-000";

    for _ in 0..2 {
        let created = start_practice(&service, USER, 5).await;
        service
            .record_answer(USER, &created.exam_id, &answer(target, WRONG))
            .await
            .unwrap();
        service.submit(USER, &created.exam_id).await.unwrap();
    }

    let open = mistakes::list_mistakes(test_db.db.pool(), USER, &MistakeFilter::default())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].question.id, target);
    assert_eq!(open[0].times_wrong, 2);

    let seen = history::get_history(test_db.db.pool(), USER, target).await.unwrap().unwrap();
    assert_eq!(seen.times_seen, 2);
    assert_eq!(seen.times_wrong, 2);
    assert_eq!(seen.mastery, MasteryLevel::Learning);
}

#[tokio::test]
async fn test_abandon_leaves_aggregates_untouched() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 5).await;
    for question in created.questions.iter().take(2) {
        service
            .record_answer(USER, &created.exam_id, &answer(&question.question_id, WRONG))
            .await
            .unwrap();
    }

    service.abandon(USER, &created.exam_id).await.unwrap();

    let pool = test_db.db.pool();
    assert!(topics::list_topics(pool, USER).await.unwrap().is_empty());
    assert_eq!(mistakes::count_open_mistakes(pool, USER).await.unwrap(), 0);
    assert_eq!(history::list_history(pool, USER).await.unwrap().len(), 2);

    let session = sessions::get_session(pool, &created.exam_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Abandoned);

    let result = service.submit(USER, &created.exam_id).await;
    assert!(matches!(result, Err(EngineError::SessionNotActive)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_double_answer_recorded_once() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    let question_id = created.questions[0].question_id.clone();
    let request = answer(&question_id, WRONG);

    let (first, second) = tokio::join!(
        service.record_answer(USER, &created.exam_id, &request),
        service.record_answer(USER, &created.exam_id, &request),
    );

    let successes = [&first, &second].iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    for result in [first, second] {
        if let Err(err) = result {
            assert!(
                matches!(err, EngineError::AlreadyAnswered | EngineError::DuplicateAnswer),
                "unexpected error: {err:?}"
            );
        }
    }

    let pool = test_db.db.pool();
    let session = sessions::get_session(pool, &created.exam_id).await.unwrap().unwrap();
    assert_eq!(session.answered_count, 1);
    assert_eq!(session.wrong_count, 1);

    let seen = history::get_history(pool, USER, &question_id).await.unwrap().unwrap();
    assert_eq!(seen.times_seen, 1);
}

#[tokio::test]
async fn test_second_answer_does_not_touch_history() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    let question_id = created.questions[0].question_id.clone();

    service
        .record_answer(USER, &created.exam_id, &answer(&question_id, CORRECT))
        .await
        .unwrap();
    let again = service
        .record_answer(USER, &created.exam_id, &answer(&question_id, WRONG))
        .await;
    assert!(matches!(again, Err(EngineError::AlreadyAnswered)));

    let seen = history::get_history(test_db.db.pool(), USER, &question_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.times_seen, 1);
    assert_eq!(seen.times_correct, 1);
}

#[tokio::test]
async fn test_submit_twice_is_rejected() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    for question in &created.questions {
        service
            .record_answer(USER, &created.exam_id, &answer(&question.question_id, CORRECT))
            .await
            .unwrap();
    }

    let first = service.submit(USER, &created.exam_id).await.unwrap();
    assert_eq!(first.score_percentage, 100.0);
    assert!(first.passed);
    assert_eq!(first.strong_topics, vec!["ethics".to_string()]);

    let second = service.submit(USER, &created.exam_id).await;
    assert!(matches!(second, Err(EngineError::SessionAlreadyCompleted)));

    let topic_rows = topics::list_topics(test_db.db.pool(), USER).await.unwrap();
    assert_eq!(topic_rows[0].total_questions, 3);
}

#[tokio::test]
async fn test_answer_after_submit_rejected() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    service.submit(USER, &created.exam_id).await.unwrap();

    let late = service
        .record_answer(USER, &created.exam_id, &answer(&created.questions[0].question_id, CORRECT))
        .await;
    assert!(matches!(late, Err(EngineError::SessionNotActive)));
}

#[tokio::test]
async fn test_answer_validation() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    common::seed_questions(&test_db.db, "labor", Difficulty::Medium, 1).await;
    let service = common::create_exam_service(&test_db.db);

    let created = service
        .create(
            USER,
            &CreateExamRequest {
                exam_type: ExamType::Practice,
                question_count: Some(3),
                topics: Some(vec!["ethics".to_string()]),
                difficulty: None,
            },
        )
        .await
        .unwrap();
    assert!(created.questions.iter().all(|question| question.topic == "ethics"));

    let invalid = service
        .record_answer(USER, &created.exam_id, &answer(&created.questions[0].question_id, "F"))
        .await;
    assert!(matches!(invalid, Err(EngineError::InvalidAnswer)));

    let foreign = service
        .record_answer(USER, &created.exam_id, &answer("labor-medium-000", CORRECT))
        .await;
    assert!(matches!(foreign, Err(EngineError::QuestionNotInSession)));

    let lower = service
        .record_answer(USER, &created.exam_id, &answer(&created.questions[0].question_id, " a "))
        .await
        .unwrap();
    assert!(lower.is_correct);
}

#[tokio::test]
async fn test_time_limit_enforced() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);

    let created = service
        .create(USER, &create_request(ExamType::FullSimulation, Some(5)))
        .await
        .unwrap();
    assert_eq!(created.time_limit_seconds, Some(5 * 72));

    sqlx::query(r#"UPDATE "exam_sessions" SET "started_at" = "started_at" - ? WHERE "id" = ?"#)
        .bind(400_000_i64)
        .bind(&created.exam_id)
        .execute(test_db.db.pool())
        .await
        .unwrap();

    let late = service
        .record_answer(USER, &created.exam_id, &answer(&created.questions[0].question_id, CORRECT))
        .await;
    assert!(matches!(late, Err(EngineError::TimeLimitExceeded)));

    let detail = service.detail(USER, &created.exam_id).await.unwrap();
    assert_eq!(detail.time_remaining_seconds, Some(0));

    // Submission after the deadline still scores the session
    let result = service.submit(USER, &created.exam_id).await.unwrap();
    assert_eq!(result.score_percentage, 0.0);
}

#[tokio::test]
async fn test_review_mode_clears_corrected_mistakes() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);

    let practice = start_practice(&service, USER, 5).await;
    for question in &practice.questions {
        service
            .record_answer(USER, &practice.exam_id, &answer(&question.question_id, WRONG))
            .await
            .unwrap();
    }
    service.submit(USER, &practice.exam_id).await.unwrap();
    assert_eq!(mistakes::count_open_mistakes(test_db.db.pool(), USER).await.unwrap(), 5);

    let review = service
        .create(USER, &create_request(ExamType::ReviewMistakes, None))
        .await
        .unwrap();
    assert_eq!(review.total_questions, 5);

    for question in &review.questions {
        service
            .record_answer(USER, &review.exam_id, &answer(&question.question_id, CORRECT))
            .await
            .unwrap();
    }
    let result = service.submit(USER, &review.exam_id).await.unwrap();
    assert_eq!(result.mistakes_cleared, 5);
    assert_eq!(mistakes::count_open_mistakes(test_db.db.pool(), USER).await.unwrap(), 0);

    let all = mistakes::list_mistakes(
        test_db.db.pool(),
        USER,
        &MistakeFilter {
            topic: None,
            include_reviewed: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|mistake| mistake.reviewed && mistake.reviewed_at.is_some()));
}

#[tokio::test]
async fn test_practice_correct_answer_keeps_mistake_open() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 2).await;
    let service = common::create_exam_service(&test_db.db);
    let target = "ethics-medium-000";

    let first = start_practice(&service, USER, 2).await;
    service
        .record_answer(USER, &first.exam_id, &answer(target, WRONG))
        .await
        .unwrap();
    service.submit(USER, &first.exam_id).await.unwrap();

    let second = start_practice(&service, USER, 2).await;
    service
        .record_answer(USER, &second.exam_id, &answer(target, CORRECT))
        .await
        .unwrap();
    let result = service.submit(USER, &second.exam_id).await.unwrap();

    assert_eq!(result.mistakes_cleared, 0);
    assert_eq!(mistakes::count_open_mistakes(test_db.db.pool(), USER).await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_active_session_per_user() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 5).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    let again = service.create(USER, &create_request(ExamType::Practice, Some(3))).await;
    assert!(matches!(again, Err(EngineError::ActiveSessionExists)));

    // Another user is unaffected
    start_practice(&service, "user-2", 3).await;

    service.abandon(USER, &created.exam_id).await.unwrap();
    start_practice(&service, USER, 3).await;
}

#[tokio::test]
async fn test_sessions_are_private_to_their_user() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;

    let detail = service.detail("intruder", &created.exam_id).await;
    assert!(matches!(detail, Err(EngineError::SessionNotFound)));

    let submit = service.submit("intruder", &created.exam_id).await;
    assert!(matches!(submit, Err(EngineError::SessionNotFound)));

    let missing = service.detail(USER, "no-such-exam").await;
    assert!(matches!(missing, Err(EngineError::SessionNotFound)));
}

#[tokio::test]
async fn test_detail_reveals_answers_only_when_answered() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    let first = created.questions[0].question_id.clone();
    service
        .record_answer(USER, &created.exam_id, &answer(&first, CORRECT))
        .await
        .unwrap();
    service
        .flag(
            USER,
            &created.exam_id,
            &FlagRequest {
                question_id: created.questions[1].question_id.clone(),
                flagged: true,
            },
        )
        .await
        .unwrap();

    let detail = service.detail(USER, &created.exam_id).await.unwrap();
    assert_eq!(detail.questions.len(), 3);
    for question in &detail.questions {
        let answered = question.question.question_id == first;
        assert_eq!(question.correct_answer.is_some(), answered);
        assert_eq!(question.user_answer.is_some(), answered);
    }
    assert!(detail.questions[1].flagged);

    service.submit(USER, &created.exam_id).await.unwrap();
    let detail = service.detail(USER, &created.exam_id).await.unwrap();
    assert!(detail.questions.iter().all(|question| question.correct_answer.is_some()));
}

#[tokio::test]
async fn test_list_sessions_by_status() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let first = start_practice(&service, USER, 3).await;
    service.submit(USER, &first.exam_id).await.unwrap();
    start_practice(&service, USER, 3).await;

    let all = service.list(USER, &ListExamsQuery::default()).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.exams.len(), 2);

    let completed = service
        .list(
            USER,
            &ListExamsQuery {
                status: Some(SessionStatus::Completed),
                ..ListExamsQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.total, 1);
    assert_eq!(completed.exams[0].exam_id, first.exam_id);
}

#[tokio::test]
async fn test_question_count_bounds() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let zero = service.create(USER, &create_request(ExamType::Practice, Some(0))).await;
    assert!(matches!(zero, Err(EngineError::InvalidRequest(_))));

    let huge = service.create(USER, &create_request(ExamType::Practice, Some(101))).await;
    assert!(matches!(huge, Err(EngineError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_stale_sessions_abandoned_by_cleanup() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let stale = start_practice(&service, USER, 3).await;
    let fresh = start_practice(&service, "user-2", 3).await;

    sqlx::query(r#"UPDATE "exam_sessions" SET "last_activity_at" = "last_activity_at" - ? WHERE "id" = ?"#)
        .bind(25 * 3_600_000_i64)
        .bind(&stale.exam_id)
        .execute(test_db.db.pool())
        .await
        .unwrap();

    let abandoned = exam_backend::workers::session_cleanup::abandon_stale_sessions(&test_db.db, 24)
        .await
        .unwrap();
    assert_eq!(abandoned, 1);

    let pool = test_db.db.pool();
    let stale = sessions::get_session(pool, &stale.exam_id).await.unwrap().unwrap();
    assert_eq!(stale.status, SessionStatus::Abandoned);
    let fresh = sessions::get_session(pool, &fresh.exam_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, SessionStatus::InProgress);

    // A new exam can start once the stale one is closed
    start_practice(&service, USER, 3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_racing_answer_stays_consistent() {
    let test_db = common::create_test_db().await;
    common::seed_questions(&test_db.db, "ethics", Difficulty::Medium, 3).await;
    let service = common::create_exam_service(&test_db.db);

    let created = start_practice(&service, USER, 3).await;
    let request = answer(&created.questions[0].question_id, CORRECT);

    let (answered, submitted) = tokio::join!(
        service.record_answer(USER, &created.exam_id, &request),
        service.submit(USER, &created.exam_id),
    );
    let submitted = submitted.expect("submit must win or follow the answer");

    let pool = test_db.db.pool();
    let session = sessions::get_session(pool, &created.exam_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    match answered {
        Ok(_) => {
            assert_eq!(session.answered_count, 1);
            assert_eq!(submitted.correct_answers, 1);
        }
        Err(err) => {
            assert!(matches!(err, EngineError::SessionNotActive), "unexpected error: {err:?}");
            assert_eq!(session.answered_count, 0);
            assert_eq!(submitted.correct_answers, 0);
        }
    }
    assert_eq!(session.correct_count, submitted.correct_answers);

    let logged: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "answer_log" WHERE "session_id" = ?"#)
        .bind(&created.exam_id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(logged, session.answered_count);
}
