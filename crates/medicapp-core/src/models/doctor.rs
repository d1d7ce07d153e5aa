use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub employee_id: String,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub specialization: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: Option<String>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Search on first name, last name or employee id.
    pub fn matches(&self, query: &str) -> bool {
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.last_name, query)
            || contains_ignore_case(&self.employee_id, query)
    }
}

/// Body for doctor registration (public self-registration and admin add).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDoctor {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub employee_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorStats {
    #[serde(default)]
    pub total_doctors: u64,
    #[serde(default)]
    pub active_doctors: u64,
    #[serde(default)]
    pub specializations: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest<'a> {
    pub employee_id: &'a str,
    pub email: &'a str,
}
