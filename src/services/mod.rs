pub mod detection_service;
pub mod grading_service;
pub mod normalization_service;
pub mod validation_service;
