//! Tradeable resource types and the worker roles that produce them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A tradeable unit.
///
/// Patients are modelled as resources so they move through the same
/// buy/sell machinery as materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Medication.
    Pill,
    /// Injection syringe.
    Syringe,
    /// Thermometer.
    Thermometer,
    /// Stethoscope.
    Stethoscope,
    /// Scalpel.
    Scalpel,
    /// A patient waiting for treatment.
    PatientSick,
    /// A treated patient waiting for a hospital bed.
    PatientHealed,
}

impl ResourceType {
    /// Every resource type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Pill,
        Self::Syringe,
        Self::Thermometer,
        Self::Stethoscope,
        Self::Scalpel,
        Self::PatientSick,
        Self::PatientHealed,
    ];

    /// Raw materials produced by suppliers.
    pub const MATERIALS: [Self; 5] = [
        Self::Pill,
        Self::Syringe,
        Self::Thermometer,
        Self::Stethoscope,
        Self::Scalpel,
    ];

    /// Returns true for the two patient states.
    #[must_use]
    pub const fn is_patient(self) -> bool {
        matches!(self, Self::PatientSick | Self::PatientHealed)
    }

    /// Returns true for raw materials.
    #[must_use]
    pub const fn is_material(self) -> bool {
        !self.is_patient()
    }

    /// The worker role whose labor produces one unit of this resource.
    #[must_use]
    pub const fn produced_by(self) -> EmployeeRole {
        match self {
            Self::PatientSick => EmployeeRole::Nurse,
            Self::PatientHealed => EmployeeRole::Doctor,
            Self::Pill | Self::Syringe | Self::Thermometer | Self::Stethoscope | Self::Scalpel => {
                EmployeeRole::Supplier
            }
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pill => "pill",
            Self::Syringe => "syringe",
            Self::Thermometer => "thermometer",
            Self::Stethoscope => "stethoscope",
            Self::Scalpel => "scalpel",
            Self::PatientSick => "sick patient",
            Self::PatientHealed => "healed patient",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A salaried worker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    /// Produces raw materials.
    Supplier,
    /// Admits and moves patients.
    Nurse,
    /// Treats patients.
    Doctor,
}

impl EmployeeRole {
    /// Every role.
    pub const ALL: [Self; 3] = [Self::Supplier, Self::Nurse, Self::Doctor];
}

impl fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplier => write!(f, "supplier"),
            Self::Nurse => write!(f, "nurse"),
            Self::Doctor => write!(f, "doctor"),
        }
    }
}
