use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::general::error::{ScheduleError, SolverError};

/// A scalar model parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    /// Numeric view of the value; booleans and strings have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Int(value) => Some(*value as f64),
            ParameterValue::Float(value) => Some(*value),
            ParameterValue::Bool(_) | ParameterValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(value) => write!(f, "{}", value),
            ParameterValue::Int(value) => write!(f, "{}", value),
            ParameterValue::Float(value) => write!(f, "{}", value),
            ParameterValue::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

/// Coerce a raw string: empty -> absent, `true`/`false` -> bool, then int,
/// then float, otherwise the string itself.
pub fn str_to_cast(element: Option<&str>) -> Option<ParameterValue> {
    let element = element?;
    if element.is_empty() {
        return None;
    }
    if element.eq_ignore_ascii_case("true") {
        return Some(ParameterValue::Bool(true));
    }
    if element.eq_ignore_ascii_case("false") {
        return Some(ParameterValue::Bool(false));
    }
    if let Ok(value) = element.parse::<i64>() {
        return Some(ParameterValue::Int(value));
    }
    if let Ok(value) = element.parse::<f64>() {
        return Some(ParameterValue::Float(value));
    }
    Some(ParameterValue::Str(element.to_string()))
}

/// Named model parameters; `None` marks an explicitly absent value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    values: IndexMap<String, Option<ParameterValue>>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<ParameterValue>) {
        self.values.insert(name.into(), value);
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.insert(name, Some(value.into()));
    }

    /// Copy every entry of `other` into `self`, replacing existing names.
    pub fn merge(&mut self, other: &ParameterSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name).and_then(Option::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ParameterValue>)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Numeric parameter, `Ok(None)` when missing or absent.
    pub fn number(&self, name: &str) -> Result<Option<f64>, SolverError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| SolverError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    pub fn require_number(&self, name: &str) -> Result<f64, SolverError> {
        self.number(name)?
            .ok_or_else(|| SolverError::MissingParameter(name.to_string()))
    }

    pub fn number_or(&self, name: &str, default: f64) -> Result<f64, SolverError> {
        Ok(self.number(name)?.unwrap_or(default))
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (name, value) in iter {
            set.set(name, value);
        }
        set
    }
}

/// Parameters read from a flat `key=value` file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSource {
    pub path: PathBuf,
    pub parameters: ParameterSet,
}

impl ParameterSource {
    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let raw = fs::read_to_string(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parameters = parse_parameter_text(&raw).map_err(|message| ScheduleError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            parameters,
        })
    }
}

/// Parse `key=value` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is accepted and matching quotes around values are removed.
pub fn parse_parameter_text(raw: &str) -> Result<ParameterSet, String> {
    let mut parameters = ParameterSet::new();
    for (line_num, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected 'key=value', got '{}'", line_num + 1, line))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("line {}: empty parameter name", line_num + 1));
        }
        parameters.insert(key, str_to_cast(Some(unquote(value.trim()))));
    }
    Ok(parameters)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Initial state of the system at the first scheduled interval.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitialConditions {
    /// Battery state of charge, fraction 0-1 of rated capacity.
    pub battery_soc_t0: Option<f64>,
    /// Peak grid consumption already realized this month, per site (kW).
    pub peak_consumption: IndexMap<String, f64>,
}

impl InitialConditions {
    pub fn to_parameters(&self) -> ParameterSet {
        let mut parameters = ParameterSet::new();
        if let Some(soc) = self.battery_soc_t0 {
            parameters.set("battery_soc_t0", soc);
        }
        for (site, peak) in &self.peak_consumption {
            parameters.set(format!("{}_grid_p_peak_consume", site), *peak);
        }
        parameters
    }
}

/// Merge the parameter sources; later sources win on equal names.
///
/// Order: external source, initial conditions, explicit overrides.
pub fn assemble_parameters(
    source: Option<&ParameterSource>,
    initial: &InitialConditions,
    overrides: &ParameterSet,
) -> ParameterSet {
    let mut parameters = source
        .map(|source| source.parameters.clone())
        .unwrap_or_default();
    parameters.merge(&initial.to_parameters());
    parameters.merge(overrides);
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_cast_precedence() {
        assert_eq!(str_to_cast(Some("true")), Some(ParameterValue::Bool(true)));
        assert_eq!(str_to_cast(Some("FALSE")), Some(ParameterValue::Bool(false)));
        assert_eq!(str_to_cast(Some("3")), Some(ParameterValue::Int(3)));
        assert_eq!(str_to_cast(Some("3.5")), Some(ParameterValue::Float(3.5)));
        assert_eq!(str_to_cast(Some("")), None);
        assert_eq!(str_to_cast(None), None);
        assert_eq!(
            str_to_cast(Some("hello")),
            Some(ParameterValue::Str("hello".to_string()))
        );
        assert_eq!(
            str_to_cast(Some("yes")),
            Some(ParameterValue::Str("yes".to_string()))
        );
    }

    #[test]
    fn test_parse_parameter_text() {
        let raw =
            "# battery\nbattery_p=1200.0\nexport battery_e = 5702\n\nsite=\"bromberg\"\nunset=\n";
        let parameters = parse_parameter_text(raw).unwrap();

        assert_eq!(parameters.get("battery_p"), Some(&ParameterValue::Float(1200.0)));
        assert_eq!(parameters.get("battery_e"), Some(&ParameterValue::Int(5702)));
        assert_eq!(
            parameters.get("site"),
            Some(&ParameterValue::Str("bromberg".to_string()))
        );
        assert!(parameters.contains("unset"));
        assert_eq!(parameters.get("unset"), None);
    }

    #[test]
    fn test_parse_parameter_text_rejects_line_without_separator() {
        let err = parse_parameter_text("battery_p 1200").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_overrides_win_over_source() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let text = "battery_soc_t0=0.1\nbattery_e=5702\nbromberg_grid_p_peak_consume=10\n";
        std::fs::write(&file, text).unwrap();
        let source = ParameterSource::load(file.path()).unwrap();

        let mut initial = InitialConditions {
            battery_soc_t0: Some(0.5),
            ..Default::default()
        };
        initial.peak_consumption.insert("bromberg".to_string(), 250.0);
        let overrides: ParameterSet = [("battery_e", 6000.0)].into_iter().collect();

        let parameters = assemble_parameters(Some(&source), &initial, &overrides);

        assert_eq!(parameters.number("battery_soc_t0").unwrap(), Some(0.5));
        assert_eq!(parameters.number("battery_e").unwrap(), Some(6000.0));
        assert_eq!(
            parameters.number("bromberg_grid_p_peak_consume").unwrap(),
            Some(250.0)
        );
    }

    #[test]
    fn test_number_rejects_non_numeric_values() {
        let mut parameters = ParameterSet::new();
        parameters.set("flag", true);

        assert!(matches!(
            parameters.number("flag"),
            Err(SolverError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parameters.require_number("missing"),
            Err(SolverError::MissingParameter(_))
        ));
        assert_eq!(parameters.number_or("missing", 2.0).unwrap(), 2.0);
    }
}
