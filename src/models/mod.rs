mod organization;
mod project;
mod usage;
mod user;

pub use organization::*;
pub use project::*;
pub use usage::*;
pub use user::*;
