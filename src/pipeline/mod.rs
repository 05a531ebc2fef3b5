pub mod dispatch;
pub mod planner;
pub mod runner;
pub mod transform;

pub use dispatch::{dispatch, DispatchSummary};
pub use planner::{plan, Plan};
pub use runner::{EtlRunner, RunError, RunOutcome, RunReport, RunState};
pub use transform::{transform, MalformedRow};
