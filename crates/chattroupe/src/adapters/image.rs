//! Image questions through the multimodal model

use bytes::Bytes;
use image::ImageFormat;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::providers::{GenerationRequest, LlmProvider, Part, Turn};
use crate::types::{FileType, ImageInfo};

/// A decoded-once PNG or JPEG upload
#[derive(Debug, Clone)]
pub struct UploadedImage {
    filename: String,
    file_type: FileType,
    data: Bytes,
    width: u32,
    height: u32,
}

impl UploadedImage {
    /// Validate an upload
    ///
    /// The filename must carry a png/jpg/jpeg extension and the bytes must
    /// decode as PNG or JPEG. The MIME type sent to the model follows the
    /// bytes, not the extension.
    pub fn decode(filename: impl Into<String>, data: impl Into<Bytes>) -> Result<Self> {
        let filename = filename.into();
        let data = data.into();

        if !FileType::from_filename(&filename).is_image() {
            return Err(Error::UnsupportedFile(format!(
                "{}; upload a JPG, JPEG or PNG image",
                filename
            )));
        }

        let (format, file_type) = match image::guess_format(&data) {
            Ok(ImageFormat::Png) => (ImageFormat::Png, FileType::Png),
            Ok(ImageFormat::Jpeg) => (ImageFormat::Jpeg, FileType::Jpeg),
            Ok(other) => {
                return Err(Error::file_read(
                    &filename,
                    format!("{:?} data is not a PNG or JPEG image", other),
                ))
            }
            Err(e) => return Err(Error::file_read(&filename, e.to_string())),
        };

        let decoded = image::load_from_memory_with_format(&data, format)
            .map_err(|e| Error::file_read(&filename, e.to_string()))?;

        Ok(Self {
            filename,
            file_type,
            width: decoded.width(),
            height: decoded.height(),
            data,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &'static str {
        self.file_type.mime_type()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            filename: self.filename.clone(),
            file_type: self.file_type,
            width: self.width,
            height: self.height,
            size_bytes: self.data.len(),
        }
    }

    /// The raw bytes as an inline request part
    pub fn to_part(&self) -> Part {
        Part::InlineData {
            mime_type: self.mime_type().to_string(),
            data: self.data.clone(),
        }
    }
}

/// Sends images, with or without a question, to the vision model
pub struct ImageQa {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl ImageQa {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self {
            llm,
            model: config.gemini.vision_model.clone(),
        }
    }

    /// Ask about `image`; a blank or absent question sends the image alone
    pub async fn ask(&self, image: &UploadedImage, question: Option<&str>) -> Result<String> {
        let parts = match question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(question) => vec![Part::text(question), image.to_part()],
            None => vec![image.to_part()],
        };

        tracing::info!(
            "Image request for {} ({} bytes, question: {})",
            image.filename,
            image.data.len(),
            parts.len() > 1
        );

        let request = GenerationRequest::new(self.model.clone(), vec![Turn::user(parts)]);
        self.llm.generate(request).await
    }
}
