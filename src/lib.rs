pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::{
    grading_service::GradingService, normalization_service::NormalizationService,
    validation_service::ValidationService,
};
use crate::utils::id::UuidIdGenerator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub normalization_service: NormalizationService,
    pub validation_service: ValidationService,
    pub grading_service: GradingService,
    pub max_batch_questions: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let normalization_service =
            NormalizationService::new(Arc::new(UuidIdGenerator), config.normalizer_settings());
        let validation_service = ValidationService::new();
        let grading_service = GradingService::new(config.grading_settings());

        Self {
            normalization_service,
            validation_service,
            grading_service,
            max_batch_questions: config.max_batch_questions,
        }
    }
}
