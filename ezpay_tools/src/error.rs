use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EzPayApiError {
    #[error("Could not initialize the EzPay client: {0}")]
    Initialization(String),
    #[error("The gateway rejected the initiation: {0}")]
    InitiationRejected(String),
    #[error("HTTP error talking to the gateway: {0}")]
    RequestError(String),
    #[error("Could not parse the gateway response: {0}")]
    JsonError(String),
    #[error("No transaction-status endpoint produced a usable response: {0}")]
    StatusUnavailable(String),
}
