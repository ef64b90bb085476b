pub mod authz;
pub mod auto_signin;
pub mod metrics;

pub use authz::authz_middleware;
pub use auto_signin::{auto_signin_middleware, SessionUser};
pub use metrics::metrics_middleware;
