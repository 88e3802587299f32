pub mod ease;
pub mod interval;
pub mod review_item;
pub mod review_session;
pub mod scheduler;
pub mod score;
pub mod session_log;

pub use review_item::{IntervalStage, ReviewItem, ReviewItemId, SubjectPath};
pub use review_session::{ReviewDesk, ReviewSession};
pub use scheduler::{GraduationPolicy, ReviewOutcome, Scheduler, ScoreThreshold};
pub use score::PerformanceScore;
pub use session_log::SessionLogEntry;
