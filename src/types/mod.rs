//! Request and response types of the HTTP API

pub mod request;
pub mod response;

pub use request::{ClientRequest, DistributionRequest};
pub use response::{DistributionResponse, ErrorBody, HealthResponse, PredictResponse};
