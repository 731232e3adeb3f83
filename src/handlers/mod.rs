//! HTTP handlers: generic table CRUD, per-module dashboards and the platform services.

pub mod billing;
pub mod customization;
pub mod dashboard;
pub mod entity;
pub mod onboarding;
pub mod protocol;
pub mod session;
