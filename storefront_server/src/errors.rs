use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use storefront_engine::{AffiliateError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("💻️ {self}");
                "Something went wrong on our side. Please try again later.".to_string()
            },
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Validation(_) | OrderFlowError::MissingIdentity => Self::ValidationError(e.to_string()),
            OrderFlowError::NotFound(s) => Self::NoRecordFound(s),
            OrderFlowError::InsufficientStock { .. } | OrderFlowError::CannotCancel { .. } => {
                Self::Conflict(e.to_string())
            },
            OrderFlowError::SpecificationNotFound(s) => Self::Unprocessable(s),
            OrderFlowError::PaymentGateway(_) => Self::GatewayError(e.to_string()),
            OrderFlowError::Internal(s) => Self::BackendError(s),
        }
    }
}

impl From<AffiliateError> for ServerError {
    fn from(e: AffiliateError) -> Self {
        match e {
            AffiliateError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            AffiliateError::InvalidAmount(_) => Self::ValidationError(e.to_string()),
            AffiliateError::InsufficientBalance { .. } => Self::Conflict(e.to_string()),
            AffiliateError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}
