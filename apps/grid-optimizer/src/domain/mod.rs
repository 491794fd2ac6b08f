//! Domain layer - grid search vocabulary with no infrastructure dependencies.

pub mod grid;
pub mod market;
pub mod parameters;
pub mod performance;
pub mod result;
pub mod task;

pub use grid::{ParameterGrid, ParameterGridBuilder, float_range};
pub use market::{PriceRecord, RatingRecord, ZScorePoint};
pub use parameters::{ParameterCombination, SharedContext, TimeWindow};
pub use performance::PerformanceMetrics;
pub use result::{
    OptimizationRun, RunOutcome, TaskError, TaskErrorKind, TaskResult, TaskStatus,
};
pub use task::{ParameterBounds, PriorityPolicy, Task, TaskId, TaskPriority, TaskState};
