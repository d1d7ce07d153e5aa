//! Dashboard summary figures, aggregated client-side from list endpoints.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{DoctorStats, Patient};

/// Number of most recently listed patients shown on an overview.
const RECENT_PATIENT_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub total_patients: usize,
    pub patients_by_category: BTreeMap<String, usize>,
    pub recent_patients: Vec<Patient>,
}

impl DashboardOverview {
    pub fn from_patients(patients: Vec<Patient>) -> Self {
        let mut patients_by_category = BTreeMap::new();
        for patient in &patients {
            for category in &patient.categories {
                *patients_by_category.entry(category.name.clone()).or_insert(0) += 1;
            }
        }

        // The API lists oldest first
        let skip = patients.len().saturating_sub(RECENT_PATIENT_COUNT);
        let total_patients = patients.len();
        let recent_patients = patients.into_iter().skip(skip).collect();

        Self {
            total_patients,
            patients_by_category,
            recent_patients,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    #[serde(flatten)]
    pub patients: DashboardOverview,
    pub total_doctors: u64,
    pub total_categories: usize,
    pub doctor_stats: DoctorStats,
}

impl AdminOverview {
    pub fn new(patients: Vec<Patient>, doctor_stats: DoctorStats, total_categories: usize) -> Self {
        Self {
            patients: DashboardOverview::from_patients(patients),
            total_doctors: doctor_stats.total_doctors,
            total_categories,
            doctor_stats,
        }
    }
}
