use thiserror::Error;

#[derive(Debug, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),
}
