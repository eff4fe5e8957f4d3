//! Audit planning for stored shard contracts.
//!
//! [`schedule`] turns one farmer's record into a timetable of challenges spread
//! evenly over the contract's storage window. [`AuditScheduler`] hands that
//! timetable to an injected [`AuditQueue`]; executing the audits is someone
//! else's job.

mod plan;
pub mod queue;
mod scheduler;

pub use plan::{AuditPlanEntry, ScheduleError, schedule};
pub use queue::{AuditQueue, DynQueue, QueueError, fs::FsAuditQueue, mem::MemAuditQueue};
pub use scheduler::AuditScheduler;
