//! Records held by the credential store.

pub mod application;
pub mod cert;
pub mod policy_rule;
pub mod token;
pub mod user;

pub use application::{Application, TokenFormat};
pub use cert::Cert;
pub use policy_rule::{Effect, PolicyRule, RuleParseError};
pub use token::{Code, Token, TokenWrapper};
pub use user::{User, UserShort};
