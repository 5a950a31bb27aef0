pub mod answer_log;
pub mod history;
pub mod mistakes;
pub mod questions;
pub mod sessions;
pub mod topics;

pub use answer_log::{LoggedAnswer, TopicTally};
pub use history::QuestionHistory;
pub use mistakes::{Mistake, MistakeFilter};
pub use questions::{AnswerOption, NewQuestion, Question, QuestionFilter, TopicCount};
pub use sessions::{AnswerSlot, CompletedStats, ExamSession, ExamType, NewSession, SessionStatus, SlotWithQuestion};
pub use topics::TopicPerformance;
