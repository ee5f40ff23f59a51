use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway rejected the request: {0}")]
    Rejected(String),
    #[error("The gateway returned an empty response")]
    EmptyResponse,
}
