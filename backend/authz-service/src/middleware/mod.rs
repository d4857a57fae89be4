pub mod authorization;

pub use authorization::{
    action_for_method, extract_bearer, AuthContext, AuthorizationMiddleware,
    AuthorizationPipeline, RequestInfo,
};
