pub mod member;

pub use member::{DEFAULT_RESERVED_IDS, MemberService};
