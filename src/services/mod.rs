//! Cross-cutting services built on the generic CRUD layer.

pub mod billing;
pub mod onboarding;
pub mod protocol;
pub mod session;
pub mod tenant;

pub use billing::BillingService;
pub use onboarding::OnboardingService;
pub use protocol::ProtocolService;
pub use session::SessionService;
pub use tenant::TenantService;
