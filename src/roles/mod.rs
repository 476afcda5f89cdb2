// 角色管理 - 试用角色调度与批量授予
pub mod bulk;
pub mod schedule;
pub mod scheduler;
pub mod store;

pub use bulk::{assign_bulk_role, BulkRoleReport, BulkRoleRequest, PresenceFilter};
pub use schedule::{Schedule, WeekendPolicy};
pub use scheduler::{RoleScheduler, SweepReport};
pub use store::{AutoRoleGrant, GrantStore, TrialRoleSettings};
