//! Schedule resolution and dispatch
//!
//! The resolver turns a schedule document plus a calendar date into a flat,
//! time-ordered list of resolved entries: day selection with override
//! resolution, template expansion with time-offset arithmetic, and location
//! filtering against the executor's routing predicate. The dispatcher is the
//! thin driver firing resolved entries at their wall-clock minute and
//! re-resolving at day rollover.

mod dispatcher;
mod error;
mod resolver;

pub use dispatcher::Dispatcher;
pub use error::{ScheduleError, ScheduleResult};
pub use resolver::{ResolvedEntry, Resolver};
