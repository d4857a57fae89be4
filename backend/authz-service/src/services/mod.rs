/// Business logic services
pub mod application_service;
pub mod audit_log;
pub mod auth_service;
pub mod permission_service;
pub mod user_service;

pub use application_service::ApplicationService;
pub use audit_log::{sanitize_details, AuditEvent, AuditLog, RequestContext};
pub use auth_service::AuthService;
pub use permission_service::PermissionService;
pub use user_service::UserService;
