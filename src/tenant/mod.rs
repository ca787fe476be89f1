//! Tenant scoping: the resolver and the typestate context chain.

mod context;
mod resolver;

pub use context::{OrgContext, ProjectContext, UserContext};
pub use resolver::ContextResolver;
