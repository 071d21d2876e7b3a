use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::{LedgerApiError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The requested status change is not allowed. {0}")]
    TransitionForbidden(String),
    #[error("The operation conflicted with concurrent activity. Try again. {0}")]
    TemporarilyUnavailable(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::TransitionForbidden(_) => StatusCode::CONFLICT,
            Self::TemporarilyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match &e {
            SettlementError::OrderNotFound(_)
            | SettlementError::OrderIdNotFound(_)
            | SettlementError::PartnerNotFound(_)
            | SettlementError::CommissionNotFound(_) => Self::NoRecordFound(e.to_string()),
            SettlementError::InvalidTransition { .. } | SettlementError::CommissionStateConflict { .. } => {
                Self::TransitionForbidden(e.to_string())
            },
            SettlementError::ConcurrencyConflict(_) => Self::TemporarilyUnavailable(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<LedgerApiError> for ServerError {
    fn from(e: LedgerApiError) -> Self {
        match &e {
            LedgerApiError::PartnerNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerApiError::QueryError(_) => Self::InvalidRequestBody(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}
