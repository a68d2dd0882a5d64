//! Constants shared across RiskMesh crates

/// Application constants
pub mod app {
    pub const NAME: &str = "riskmesh";
    pub const DESCRIPTION: &str = "Real-time graph-based risk propagation engine";
}

/// HTTP constants
pub mod http {
    pub const DEFAULT_PORT: u16 = 8000;

    pub mod headers {
        pub const API_KEY: &str = "x-api-key";
    }
}

/// Cache constants
pub mod cache {
    pub const DEFAULT_USER_RISK_TTL_MINUTES: u64 = 30;

    /// Cache key prefixes
    pub mod keys {
        pub const USER_RISK: &str = "user_risk:";
    }
}
