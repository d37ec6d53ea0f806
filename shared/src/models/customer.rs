//! Customer models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Input for creating or editing a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(custom = "crate::validation::phone_rule")]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CustomerInput {
    /// Trim fields and turn blank optional fields into `None`
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: crate::validation::non_blank(self.address),
            notes: crate::validation::non_blank(self.notes),
        }
    }
}
