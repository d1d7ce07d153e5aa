use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Category;
use crate::utils::{contains_ignore_case, parse_api_date};

// Field names follow the API's model exactly (FName, PatID, ...).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    #[serde(rename = "PatID")]
    pub pat_id: i64,
    #[serde(rename = "FName")]
    pub first_name: String,
    #[serde(rename = "MName", default)]
    pub middle_name: String,
    #[serde(rename = "SName")]
    pub surname: String,
    #[serde(rename = "Age")]
    pub age: Option<f64>,
    #[serde(rename = "DOB")]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub created_at: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.surname]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Date part of the DOB timestamp.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        parse_api_date(self.date_of_birth.as_deref()?)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// Search on first name, surname or any category name.
    pub fn matches(&self, query: &str) -> bool {
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.surname, query)
            || self.categories.iter().any(|c| contains_ignore_case(&c.name, query))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientsResponse {
    #[serde(default)]
    pub patients: Vec<Patient>,
}

/// Body for creating or updating a patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(rename = "FName")]
    pub first_name: String,
    #[serde(rename = "MName")]
    pub middle_name: String,
    #[serde(rename = "SName")]
    pub surname: String,
    #[serde(rename = "PatID")]
    pub pat_id: i64,
    #[serde(rename = "DOB")]
    pub date_of_birth: NaiveDate,
    pub city: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}
