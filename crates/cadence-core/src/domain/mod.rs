//! Domain model (ids, recurrence rules, tasks, relationships, errors, events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod recurrence;
pub mod relations;
pub mod task;

pub use self::errors::{CadenceError, ErrorKind, ValidationError};
pub use self::events::{CascadeFailure, CascadeWarning, DomainEvent, SchedulingConflict};
pub use self::ids::{ParseIdError, TaskId};
pub use self::recurrence::{IntervalUnit, OverdueBehavior, RecurrenceRule};
pub use self::relations::{EdgeKind, RelationGraph, RelationRequest, TaskRelations};
pub use self::task::{CompletionSnapshot, Task, TaskDraft};
