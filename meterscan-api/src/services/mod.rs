//! Outbound services: vision API and image storage

pub mod image_store;
pub mod vision;

pub use image_store::ImageStore;
pub use vision::{GeminiVisionClient, VisionClient, VisionError, VisionReading};
