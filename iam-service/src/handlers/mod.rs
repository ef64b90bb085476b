pub mod account;
pub mod metrics;
pub mod oauth;
pub mod params;
pub mod well_known;

pub use account::*;
pub use metrics::*;
pub use oauth::*;
pub use well_known::*;
