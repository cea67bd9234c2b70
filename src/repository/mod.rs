pub mod member;
pub mod translator;

pub use member::{Member, MemberRepository};
pub use translator::ErrorTranslator;
