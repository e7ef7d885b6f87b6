use crate::attendance::face::FaceDetections;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use reqwest::header::CONTENT_TYPE;
use std::io::Cursor;

/// Face detection and encoding backend. Returns every face found, in any order.
#[async_trait]
pub trait FaceExtractor: Send + Sync {
    async fn detect(&self, image: &RgbImage) -> Result<FaceDetections>;
}

/// Sends the decoded frame as PNG to an external face-encoding service.
pub struct HttpFaceExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFaceExtractor {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl FaceExtractor for HttpFaceExtractor {
    async fn detect(&self, image: &RgbImage) -> Result<FaceDetections> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode frame as PNG")?;

        let detections = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "image/png")
            .body(png)
            .send()
            .await
            .context("Face extractor request failed")?
            .error_for_status()
            .context("Face extractor returned an error status")?
            .json::<FaceDetections>()
            .await
            .context("Face extractor returned an unreadable body")?;

        tracing::debug!(
            "Face extractor {} found {} face(s)",
            detections.model_version,
            detections.faces.len()
        );

        Ok(detections)
    }
}
