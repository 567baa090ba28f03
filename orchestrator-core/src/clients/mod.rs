//! Downstream service clients (spec §4.C1): one dedicated client per external
//! collaborator, each wrapping [`facade::ServiceClient`] for circuit breaking,
//! retry, and timeouts.
//!
//! The Chronicle store is the exception: per spec §5's "two database pools"
//! (Episode+Knowledge+Working in one, Chronicle in another), it is a direct,
//! connection-pooled store rather than an HTTP client — see
//! [`crate::store::ChronicleStore`], which the Chronicle Pattern Analyzer and
//! Decision Auditor wrap in their own [`crate::circuit_breaker::CircuitBreaker`].

pub mod backlog;
pub mod control_plane;
mod facade;
pub mod project;
pub mod sprint;

pub use backlog::{AssignTasksRequest, BacklogClient, HttpBacklogClient};
pub use control_plane::{cronjob_name, ControlPlaneClient, CronJobManifest, HttpControlPlaneClient};
pub use facade::ServiceClient;
pub use project::{HttpProjectClient, ProjectClient};
pub use sprint::{CreateSprintRequest, HttpSprintClient, SprintClient};
