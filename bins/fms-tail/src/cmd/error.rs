use fms_api::ConfigError;
use fms_bridge::BridgeError;

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Bridge(#[from] BridgeError),
}
