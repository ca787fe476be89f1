mod members;
mod usage;

pub use members::MemberService;
pub use usage::UsageAggregator;
