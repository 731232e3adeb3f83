pub mod tenant;

pub use tenant::{ServiceKey, TenantId};
