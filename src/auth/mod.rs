mod claims;
pub(crate) mod extractors;

pub use extractors::{AuthUser, ServiceRole};
