//! Family tasks: storage, Eisenhower analysis, weekly planning and the
//! quick-entry parser shared with event creation.

pub mod backend;
pub mod error;
pub mod planner;
pub mod priority;
pub mod quick_entry;
pub mod service;
pub mod store;
pub mod types;

pub use backend::TaskBackend;
pub use error::{TaskError, TaskResult};
pub use planner::{plan_week, PlannedSlot, WeeklyPlan, WorkingHours};
pub use priority::{analyze_priority, rank_tasks, PriorityAnalysis, Quadrant};
pub use quick_entry::{parse_segments, ParsedSegment, QuickEntry, SegmentKind};
pub use service::TaskService;
pub use store::SqliteTaskStore;
pub use types::{NewTask, Subtask, Task, TaskPatch, Timeframe};
