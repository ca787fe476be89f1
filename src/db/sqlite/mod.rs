mod common;
mod organizations;
mod projects;
mod usage;
mod users;

pub use organizations::SqliteOrganizationRepo;
pub use projects::SqliteProjectRepo;
pub use usage::SqliteUsageEventRepo;
pub use users::SqliteUserRepo;
