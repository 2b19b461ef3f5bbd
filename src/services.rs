mod env_manager;
mod name_locks;
mod task_queue;

pub use env_manager::{EnvManager, ManagerSettings, list_environments};
pub use name_locks::{NameGuard, NameLocks};
pub use task_queue::{TaskError, TaskHandle, TaskQueue};
