use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::general::error::SolverError;

/// Output column with the battery setpoint (kW, positive = discharging).
pub const BATTERY_SETPOINT_COLUMN: &str = "battery_setpoint_kW";
/// Output column with the battery state of charge (0-1 of rated capacity).
pub const BATTERY_SOC_COLUMN: &str = "battery_soc";
/// Solver input parameter holding the rated battery capacity (kWh).
pub const BATTERY_CAPACITY_PARAMETER: &str = "battery_e";

/// One grid connection point with its metered loads and generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLayout {
    pub name: String,
    /// Input columns consumed at this site (kW).
    #[serde(default)]
    pub demand_columns: Vec<String>,
    /// Input columns produced at this site (kW).
    #[serde(default)]
    pub generation_columns: Vec<String>,
}

impl SiteLayout {
    pub fn new(name: &str, demand_columns: &[&str], generation_columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            demand_columns: demand_columns.iter().map(|c| c.to_string()).collect(),
            generation_columns: generation_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Topology of the scheduled system, shared by the model builder and the
/// result extraction so both agree on component names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLayout {
    pub sites: Vec<SiteLayout>,
    /// Site hosting the battery.
    pub battery_site: String,
    #[serde(default = "default_price_column")]
    pub price_column: String,
}

fn default_price_column() -> String {
    "price".to_string()
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteLayout::new(
                    "bromberg",
                    &["demand_bromberg_s", "demand_bromberg_l"],
                    &["pv_s", "pv_l"],
                ),
                SiteLayout::new("brunn", &["demand_brunn"], &[]),
                SiteLayout::new("kirchschlag", &["demand_kirchschlag"], &[]),
            ],
            battery_site: "bromberg".to_string(),
            price_column: default_price_column(),
        }
    }
}

impl ModelLayout {
    /// Load a layout from a JSON model file.
    pub fn load(path: &Path) -> Result<Self, SolverError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| SolverError::Model(format!("{}: {}", path.display(), e)))?;
        let layout: ModelLayout = serde_json::from_str(&raw)
            .map_err(|e| SolverError::Model(format!("{}: {}", path.display(), e)))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if self.sites.is_empty() {
            return Err(SolverError::Model("layout has no sites".to_string()));
        }
        let mut names = HashSet::new();
        for site in &self.sites {
            if !names.insert(site.name.as_str()) {
                return Err(SolverError::Model(format!("duplicate site '{}'", site.name)));
            }
        }
        if !names.contains(self.battery_site.as_str()) {
            return Err(SolverError::Model(format!(
                "battery site '{}' is not a configured site",
                self.battery_site
            )));
        }
        Ok(())
    }

    pub fn site_names(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|site| site.name.as_str())
    }

    /// Every input column the model reads.
    pub fn input_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self
            .sites
            .iter()
            .flat_map(|site| site.demand_columns.iter().chain(&site.generation_columns))
            .map(String::as_str)
            .collect();
        columns.push(&self.price_column);
        columns
    }

    pub fn metering_component(site: &str) -> String {
        format!("metering_{}", site)
    }

    pub fn metering_key(site: &str) -> String {
        format!("{}.var.flow", Self::metering_component(site))
    }

    pub fn schedule_column(site: &str) -> String {
        format!("schedule_{}_kW", site)
    }

    pub fn charging_key(&self) -> String {
        format!("{}.battery_charging.exp.in_electricity", self.battery_site)
    }

    pub fn discharging_key(&self) -> String {
        format!("{}.battery_discharging.exp.out_electricity", self.battery_site)
    }

    pub fn state_key(&self) -> String {
        format!("{}.battery_storage.var.state", self.battery_site)
    }

    pub fn softmin_key(&self) -> String {
        format!("{}.battery_storage.var.softmin", self.battery_site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = ModelLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(
            layout.site_names().collect::<Vec<_>>(),
            vec!["bromberg", "brunn", "kirchschlag"]
        );
        assert_eq!(
            layout.discharging_key(),
            "bromberg.battery_discharging.exp.out_electricity"
        );
        assert_eq!(ModelLayout::metering_key("brunn"), "metering_brunn.var.flow");
        assert!(layout.input_columns().contains(&"price"));
    }

    #[test]
    fn test_load_rejects_unknown_battery_site() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            &file,
            r#"{"sites": [{"name": "a", "demand_columns": ["load"]}], "battery_site": "b"}"#,
        )
        .unwrap();

        let err = ModelLayout::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("battery site 'b'"));
    }

    #[test]
    fn test_load_defaults_price_column() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            &file,
            r#"{"sites": [{"name": "home", "demand_columns": ["load"]}], "battery_site": "home"}"#,
        )
        .unwrap();

        let layout = ModelLayout::load(file.path()).unwrap();
        assert_eq!(layout.price_column, "price");
        assert!(layout.sites[0].generation_columns.is_empty());
    }
}
