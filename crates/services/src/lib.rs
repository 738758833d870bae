#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod chat_service;
pub mod claim_service;
pub mod dashboard;
pub mod error;
pub mod med_guarantee_service;
pub mod photo_service;
pub mod progress;
pub mod session;

pub use claim_core::Clock;

pub use app_services::{AppServices, ServiceSettings};
pub use auth_service::{AuthService, LoginOutcome};
pub use chat_service::{ChatProxyConfig, ChatReply, ChatService};
pub use claim_service::ClaimService;
pub use dashboard::{DashboardService, DashboardView};
pub use error::{
    AppServicesError, AuthError, ChatServiceError, ClaimServiceError, DashboardError,
    PhotoServiceError, ProgressServiceError,
};
pub use med_guarantee_service::MedGuaranteeService;
pub use photo_service::PhotoService;
pub use progress::{
    ProgressService, ProgressSnapshot, ProgressTracker, RetryPolicy, SyncStatus, TaskOutcome,
};
pub use session::{SESSION_COOKIE, SessionInfo, SessionState, SessionStore, SessionToken};
