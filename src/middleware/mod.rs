mod scope;

pub use scope::{ORG_ID_HEADER, PROJECT_ID_HEADER, ScopeIds, is_user_scoped};
