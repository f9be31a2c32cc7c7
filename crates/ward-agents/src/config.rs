//! Simulation configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use ward_ledger::CostTable;

use crate::clinic::Specialty;
use crate::error::ConfigError;
use crate::pacing::PacingConfig;
use crate::supplier::Catalogue;

/// One supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierConfig {
    /// Starting funds.
    pub fund: i64,
    /// Materials produced.
    pub catalogue: Catalogue,
}

/// One hospital.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalConfig {
    /// Starting funds.
    pub fund: i64,
    /// Number of beds.
    pub capacity: u32,
    /// Loop iterations between discharges.
    pub discharge_interval: u32,
}

impl Default for HospitalConfig {
    fn default() -> Self {
        Self {
            fund: 2_000,
            capacity: 10,
            discharge_interval: 5,
        }
    }
}

/// One clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicConfig {
    /// Starting funds.
    pub fund: i64,
    /// What the clinic treats.
    pub specialty: Specialty,
}

/// One ambulance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbulanceConfig {
    /// Starting funds.
    pub fund: i64,
    /// Sick patients on board at start.
    pub patients: u32,
}

impl Default for AmbulanceConfig {
    fn default() -> Self {
        Self {
            fund: 0,
            patients: 100,
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for reproducible agent decisions; entropy when absent.
    pub seed: Option<u64>,
    /// Prices and salaries.
    pub costs: CostTable,
    /// Simulated work delays.
    pub pacing: PacingConfig,
    /// Suppliers, in id order.
    pub suppliers: Vec<SupplierConfig>,
    /// Hospitals, in id order.
    pub hospitals: Vec<HospitalConfig>,
    /// Clinics, in id order.
    pub clinics: Vec<ClinicConfig>,
    /// Ambulances, in id order.
    pub ambulances: Vec<AmbulanceConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            costs: CostTable::default(),
            pacing: PacingConfig::default(),
            suppliers: vec![
                SupplierConfig {
                    fund: 2_000,
                    catalogue: Catalogue::Pharmacy,
                },
                SupplierConfig {
                    fund: 2_000,
                    catalogue: Catalogue::MedicalDevices,
                },
            ],
            hospitals: vec![HospitalConfig::default(), HospitalConfig::default()],
            clinics: Specialty::ALL
                .into_iter()
                .map(|specialty| ClinicConfig {
                    fund: 1_000,
                    specialty,
                })
                .collect(),
            ambulances: vec![AmbulanceConfig::default()],
        }
    }
}

impl SimConfig {
    /// Start an empty configuration.
    #[must_use]
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::default()
    }

    /// Total number of agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.suppliers.len() + self.hospitals.len() + self.clinics.len() + self.ambulances.len()
    }

    /// Check every value.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.costs.validate()?;

        if self.pacing.min_delay > self.pacing.max_delay {
            return Err(ConfigError::invalid(
                "pacing min_delay must not exceed max_delay",
            ));
        }

        let funds = self
            .suppliers
            .iter()
            .map(|s| s.fund)
            .chain(self.hospitals.iter().map(|h| h.fund))
            .chain(self.clinics.iter().map(|c| c.fund))
            .chain(self.ambulances.iter().map(|a| a.fund));
        for fund in funds {
            if fund < 0 {
                return Err(ConfigError::invalid(format!(
                    "starting funds must not be negative, got {fund}"
                )));
            }
        }

        for (i, supplier) in self.suppliers.iter().enumerate() {
            let resources = supplier.catalogue.resources();
            if resources.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "supplier {i} has an empty catalogue"
                )));
            }
            if let Some(kind) = resources.iter().find(|k| !k.is_material()) {
                return Err(ConfigError::invalid(format!(
                    "supplier {i} cannot produce {kind}"
                )));
            }
        }

        for (i, hospital) in self.hospitals.iter().enumerate() {
            if hospital.capacity == 0 {
                return Err(ConfigError::invalid(format!(
                    "hospital {i} must have at least one bed"
                )));
            }
            if hospital.discharge_interval == 0 {
                return Err(ConfigError::invalid(format!(
                    "hospital {i} discharge_interval must be positive"
                )));
            }
        }

        Ok(())
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Builder for [`SimConfig`]. Starts with no agents.
#[derive(Debug, Clone)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl Default for SimConfigBuilder {
    fn default() -> Self {
        Self {
            config: SimConfig {
                suppliers: Vec::new(),
                hospitals: Vec::new(),
                clinics: Vec::new(),
                ambulances: Vec::new(),
                ..SimConfig::default()
            },
        }
    }
}

impl SimConfigBuilder {
    /// Seed agent randomness.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set prices and salaries.
    #[must_use]
    pub fn costs(mut self, costs: CostTable) -> Self {
        self.config.costs = costs;
        self
    }

    /// Set pacing.
    #[must_use]
    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Add a supplier.
    #[must_use]
    pub fn supplier(mut self, fund: i64, catalogue: Catalogue) -> Self {
        self.config.suppliers.push(SupplierConfig { fund, catalogue });
        self
    }

    /// Add a hospital.
    #[must_use]
    pub fn hospital(mut self, fund: i64, capacity: u32, discharge_interval: u32) -> Self {
        self.config.hospitals.push(HospitalConfig {
            fund,
            capacity,
            discharge_interval,
        });
        self
    }

    /// Add a clinic.
    #[must_use]
    pub fn clinic(mut self, fund: i64, specialty: Specialty) -> Self {
        self.config.clinics.push(ClinicConfig { fund, specialty });
        self
    }

    /// Add an ambulance.
    #[must_use]
    pub fn ambulance(mut self, fund: i64, patients: u32) -> Self {
        self.config
            .ambulances
            .push(AmbulanceConfig { fund, patients });
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> SimConfig {
        self.config
    }
}
