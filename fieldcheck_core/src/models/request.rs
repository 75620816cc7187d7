//! Request and response models

use serde::{Deserialize, Serialize};

/// Sanitized body of `POST /api/users/:id`, read after the signup chains
/// have run.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SignupPayload {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
