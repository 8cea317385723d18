//! # keyshare-service
//!
//! Use cases on top of `keyshare-auth`. Each service takes the caller's
//! [`RequestContext`] and checks it before touching the store: users act
//! on their own sessions, administrators on everything.
//!
//! Services follow constructor injection; all dependencies are provided
//! at construction time.

pub mod admin;
pub mod bootstrap;
pub mod context;
pub mod report;
pub mod session;

pub use admin::{
    AdminService, CreateAccountRequest, CreatePresetRequest, CreateUserRequest, DomainCleanup,
    PresetSummary, UpdateAccountRequest, UpdatePresetRequest, UpdateUserRequest,
};
pub use bootstrap::{bootstrap_snapshot, open_store};
pub use context::RequestContext;
pub use report::{AccountOverview, AccountUsage, ReportService, UserUsage};
pub use session::SessionService;
