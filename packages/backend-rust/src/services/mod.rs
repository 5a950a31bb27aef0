pub mod analytics;
pub mod error;
pub mod exam;
pub mod mistakes;
pub mod performance;
pub mod question_pool;
pub mod selection;

pub use error::EngineError;
pub use exam::ExamService;
pub use performance::PerformanceStore;
pub use question_pool::QuestionPool;
pub use selection::SelectionEngine;
