//! Static price and salary table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::resource::{EmployeeRole, ResourceType};

/// Unit prices per resource and salaries per worker role.
///
/// A zero price would collide with the declined-trade sentinel, so
/// [`CostTable::validate`] insists on strictly positive entries for every
/// resource and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTable {
    /// Price of one unit of each resource.
    pub unit_costs: BTreeMap<ResourceType, i64>,
    /// Labor cost of one unit of work for each role.
    pub salaries: BTreeMap<EmployeeRole, i64>,
}

impl Default for CostTable {
    fn default() -> Self {
        let unit_costs = BTreeMap::from([
            (ResourceType::Pill, 5),
            (ResourceType::Syringe, 8),
            (ResourceType::Thermometer, 12),
            (ResourceType::Stethoscope, 30),
            (ResourceType::Scalpel, 20),
            (ResourceType::PatientSick, 20),
            (ResourceType::PatientHealed, 60),
        ]);
        let salaries = BTreeMap::from([
            (EmployeeRole::Supplier, 3),
            (EmployeeRole::Nurse, 5),
            (EmployeeRole::Doctor, 15),
        ]);
        Self {
            unit_costs,
            salaries,
        }
    }
}

impl CostTable {
    /// Price of one unit of `kind`, or 0 when the table has no entry.
    #[must_use]
    pub fn unit_cost(&self, kind: ResourceType) -> i64 {
        self.unit_costs.get(&kind).copied().unwrap_or(0)
    }

    /// Salary paid for one unit of work by `role`, or 0 when missing.
    #[must_use]
    pub fn salary(&self, role: EmployeeRole) -> i64 {
        self.salaries.get(&role).copied().unwrap_or(0)
    }

    /// Labor cost of producing one unit of `kind`.
    #[must_use]
    pub fn labor_cost(&self, kind: ResourceType) -> i64 {
        self.salary(kind.produced_by())
    }

    /// Override a unit price.
    #[must_use]
    pub fn with_unit_cost(mut self, kind: ResourceType, cost: i64) -> Self {
        self.unit_costs.insert(kind, cost);
        self
    }

    /// Override a salary.
    #[must_use]
    pub fn with_salary(mut self, role: EmployeeRole, salary: i64) -> Self {
        self.salaries.insert(role, salary);
        self
    }

    /// Check that every resource and role has a strictly positive entry.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidCost` naming the first bad entry.
    pub fn validate(&self) -> Result<()> {
        for kind in ResourceType::ALL {
            let cost = self.unit_cost(kind);
            if cost <= 0 {
                return Err(LedgerError::InvalidCost(format!(
                    "unit cost of {kind} must be positive, got {cost}"
                )));
            }
        }
        for role in EmployeeRole::ALL {
            let salary = self.salary(role);
            if salary <= 0 {
                return Err(LedgerError::InvalidCost(format!(
                    "salary of {role} must be positive, got {salary}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = CostTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.unit_cost(ResourceType::Pill), 5);
        assert_eq!(table.salary(EmployeeRole::Doctor), 15);
    }

    #[test]
    fn test_labor_cost_follows_role() {
        let table = CostTable::default();
        assert_eq!(
            table.labor_cost(ResourceType::Scalpel),
            table.salary(EmployeeRole::Supplier)
        );
        assert_eq!(
            table.labor_cost(ResourceType::PatientHealed),
            table.salary(EmployeeRole::Doctor)
        );
    }

    #[test]
    fn test_zero_cost_rejected() {
        let table = CostTable::default().with_unit_cost(ResourceType::Syringe, 0);
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("syringe"));
    }

    #[test]
    fn test_missing_salary_rejected() {
        let mut table = CostTable::default();
        table.salaries.remove(&EmployeeRole::Nurse);
        assert_eq!(table.salary(EmployeeRole::Nurse), 0);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_entries() {
        let table = CostTable::default().with_salary(EmployeeRole::Nurse, 9);
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("patient_sick"));
        let parsed: CostTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.salary(EmployeeRole::Nurse), 9);
    }
}
