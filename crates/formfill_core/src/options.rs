use crate::ValidationError;

/// Inference device: a named backend (`cpu`, `cuda`) or a device index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Name(String),
    Index(u32),
}

impl Device {
    /// Numeric input selects a device index; anything else is a name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<u32>() {
            Ok(index) => Device::Index(index),
            Err(_) => Device::Name(raw.to_string()),
        }
    }
}

/// Per-submission detection options. `None` leaves the server default in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobOptions {
    pub model_or_path: Option<String>,
    pub device: Option<Device>,
    pub fast: Option<bool>,
    pub keep_existing_fields: Option<bool>,
    pub use_signature_fields: Option<bool>,
    pub confidence: Option<f64>,
    pub image_size: Option<u32>,
}

impl JobOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ValidationError::InvalidOption {
                    field: "confidence",
                    reason: format!("{confidence} is outside [0, 1]"),
                });
            }
        }
        if self.image_size == Some(0) {
            return Err(ValidationError::InvalidOption {
                field: "image_size",
                reason: "must be a positive integer".to_string(),
            });
        }
        if let Some(Device::Name(name)) = &self.device {
            if name.is_empty() {
                return Err(ValidationError::InvalidOption {
                    field: "device",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
