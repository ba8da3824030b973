//! Well-known event metadata keys.

pub const TENANT: &str = "tenant";
pub const USER_ID: &str = "user-id";
pub const APP: &str = "app";
pub const CAUSATION_ID: &str = "causation-id";
pub const CORRELATION_ID: &str = "correlation-id";
