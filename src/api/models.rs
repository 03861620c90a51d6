use serde::{Deserialize, Serialize};

pub use crate::models::AnalysisResponse;

#[derive(Debug, Deserialize)]
pub struct AndroidAnalysisRequest {
    pub android_app_name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct IosAnalysisRequest {
    pub ios_app_name: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
