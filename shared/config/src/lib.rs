//! RiskMesh Configuration Library
//!
//! Layered settings for the risk engine service: defaults, optional YAML
//! files, then environment variables. `DATABASE_URL`, `REDIS_URL` and `PORT`
//! are honored verbatim; everything else overrides through the `RISKMESH_`
//! prefix (e.g. `RISKMESH_ENGINE__ALPHA=0.6`).

pub mod engine;
pub mod settings;

pub use engine::{EdgeWeights, EngineConfig};
pub use settings::{ApiKeyEntry, AppSettings, AuthConfig, DatabaseConfig, RedisConfig, ServerConfig};
