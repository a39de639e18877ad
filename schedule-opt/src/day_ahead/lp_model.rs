use chrono::Duration;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, clarabel,
    constraint, variable,
};
use indexmap::IndexMap;

use crate::day_ahead::layout::{BATTERY_CAPACITY_PARAMETER, ModelLayout, SiteLayout};
use crate::day_ahead::solver::{DATA_FILE, ResultRow, Solver, SolverConfig, SolverRun, VirtualFiles};
use crate::general::error::SolverError;
use crate::general::parameters::ParameterSet;
use crate::general::time_series::TimeSeriesTable;

/// Cost per kWh of unserved demand or unabsorbed surplus.
const FEASIBILITY_PENALTY: f64 = 1.0e4;

struct BatteryParameters {
    power: f64,
    capacity: f64,
    efficiency: f64,
    loss_per_hour: f64,
    soc_min: f64,
    soc_max: f64,
    soc_t0: f64,
    vom: f64,
    softmin: f64,
    softmin_penalty: f64,
}

impl BatteryParameters {
    fn resolve(parameters: &ParameterSet) -> Result<Self, SolverError> {
        let battery = Self {
            power: parameters.require_number("battery_p")?,
            capacity: parameters.require_number(BATTERY_CAPACITY_PARAMETER)?,
            efficiency: parameters.number_or("battery_eta", 1.0)?,
            loss_per_hour: parameters.number_or("battery_loss", 0.0)?,
            soc_min: parameters.number_or("battery_soc_min", 0.0)?,
            soc_max: parameters.number_or("battery_soc_max", 1.0)?,
            soc_t0: parameters.require_number("battery_soc_t0")?,
            vom: parameters.number_or("battery_vom", 0.0)?,
            softmin: parameters.number_or("battery_soc_softmin", 0.0)?,
            softmin_penalty: parameters.number_or("battery_soc_softmin_penalty", 0.0)?,
        };
        let invalid = |name: &str, value: f64| SolverError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        };
        if battery.capacity <= 0.0 {
            return Err(invalid(BATTERY_CAPACITY_PARAMETER, battery.capacity));
        }
        if battery.power < 0.0 {
            return Err(invalid("battery_p", battery.power));
        }
        if !(battery.efficiency > 0.0 && battery.efficiency <= 1.0) {
            return Err(invalid("battery_eta", battery.efficiency));
        }
        if battery.soc_min > battery.soc_max {
            return Err(invalid("battery_soc_min", battery.soc_min));
        }
        Ok(battery)
    }
}

struct SiteParameters {
    p_max_consume: f64,
    p_max_feedin: f64,
    cost_e_consume: f64,
    cost_e_feedin: f64,
    cost_p_consume: f64,
    p_peak_consume: f64,
}

impl SiteParameters {
    fn resolve(site: &str, parameters: &ParameterSet) -> Result<Self, SolverError> {
        let name = |suffix: &str| format!("{}_{}", site, suffix);
        Ok(Self {
            p_max_consume: parameters.require_number(&name("grid_p_max_consume"))?,
            p_max_feedin: parameters.number_or(&name("grid_p_max_feedin"), 0.0)?,
            cost_e_consume: parameters.number_or(&name("grid_cost_e_consume"), 0.0)?,
            cost_e_feedin: parameters.number_or(&name("grid_cost_e_feedin"), 0.0)?,
            cost_p_consume: parameters.number_or(&name("grid_cost_p_consume"), 0.0)?,
            p_peak_consume: parameters.number_or(&name("grid_p_peak_consume"), 0.0)?,
        })
    }
}

/// Net demand (demand minus generation) of one site, per step.
struct SiteInput {
    net_demand: Vec<f64>,
}

fn column_sum(
    data: &TimeSeriesTable,
    columns: &[String],
    steps: usize,
) -> Result<Vec<f64>, SolverError> {
    let mut total = vec![0.0; steps];
    for name in columns {
        let values = data.column(name).ok_or_else(|| SolverError::MissingInput {
            file: DATA_FILE.to_string(),
            column: name.clone(),
        })?;
        for (sum, value) in total.iter_mut().zip(values) {
            *sum += value;
        }
    }
    Ok(total)
}

fn site_input(
    site: &SiteLayout,
    data: &TimeSeriesTable,
    steps: usize,
) -> Result<SiteInput, SolverError> {
    let demand = column_sum(data, &site.demand_columns, steps)?;
    let generation = column_sum(data, &site.generation_columns, steps)?;
    Ok(SiteInput {
        net_demand: demand.iter().zip(&generation).map(|(d, g)| d - g).collect(),
    })
}

struct SiteVariables {
    buy: Vec<Variable>,
    sell: Vec<Variable>,
    unserved: Vec<Variable>,
    surplus: Vec<Variable>,
    peak: Variable,
}

struct BatteryVariables {
    charge: Vec<Variable>,
    discharge: Vec<Variable>,
    state: Vec<Variable>,
    softmin: Vec<Variable>,
}

/// Linear day-ahead model of grid connections and one battery, solved with Clarabel.
///
/// Sites and input columns come from the JSON layout named in the solver
/// config; numeric inputs come from the parameter set. Power is in kW,
/// energy in kWh, prices in EUR/kWh.
#[derive(Debug, Clone, Copy)]
pub struct LpSolver {
    step_hours: f64,
}

impl Default for LpSolver {
    fn default() -> Self {
        Self::new(Duration::minutes(crate::general::settings::INTERVAL_MINUTES))
    }
}

impl LpSolver {
    pub fn new(interval: Duration) -> Self {
        Self {
            step_hours: interval.num_seconds() as f64 / 3600.0,
        }
    }
}

impl Solver for LpSolver {
    type Run = LpRun;

    fn solve(
        &self,
        config: &SolverConfig,
        parameters: &ParameterSet,
        files: &VirtualFiles,
    ) -> Result<LpRun, SolverError> {
        let layout = ModelLayout::load(&config.model_file)?;
        let data = files.get(DATA_FILE).ok_or_else(|| {
            SolverError::Model(format!("no input table named '{}'", DATA_FILE))
        })?;
        let steps = config.snapshot_count().unwrap_or(data.len());
        if steps == 0 || steps > data.len() {
            return Err(SolverError::Model(format!(
                "{} snapshots requested, input has {} rows",
                steps,
                data.len()
            )));
        }

        let battery = BatteryParameters::resolve(parameters)?;
        let sites = layout
            .sites
            .iter()
            .map(|site| {
                Ok((
                    SiteParameters::resolve(&site.name, parameters)?,
                    site_input(site, data, steps)?,
                ))
            })
            .collect::<Result<Vec<_>, SolverError>>()?;
        let price = data.column(&layout.price_column).ok_or_else(|| SolverError::MissingInput {
            file: DATA_FILE.to_string(),
            column: layout.price_column.clone(),
        })?;
        let self_consumption_penalty = parameters.number_or("self_consumption_penalty", 0.0)?;

        let dt = self.step_hours;
        let mut vars = ProblemVariables::new();
        let site_vars: Vec<SiteVariables> = sites
            .iter()
            .map(|(params, _)| SiteVariables {
                buy: (0..steps)
                    .map(|_| vars.add(variable().min(0.0).max(params.p_max_consume)))
                    .collect(),
                sell: (0..steps)
                    .map(|_| vars.add(variable().min(0.0).max(params.p_max_feedin)))
                    .collect(),
                unserved: (0..steps).map(|_| vars.add(variable().min(0.0))).collect(),
                surplus: (0..steps).map(|_| vars.add(variable().min(0.0))).collect(),
                peak: vars.add(variable().min(params.p_peak_consume)),
            })
            .collect();
        let bat = BatteryVariables {
            charge: (0..steps)
                .map(|_| vars.add(variable().min(0.0).max(battery.power)))
                .collect(),
            discharge: (0..steps)
                .map(|_| vars.add(variable().min(0.0).max(battery.power)))
                .collect(),
            state: (0..steps)
                .map(|_| {
                    vars.add(
                        variable()
                            .min(battery.soc_min * battery.capacity)
                            .max(battery.soc_max * battery.capacity),
                    )
                })
                .collect(),
            softmin: (0..steps).map(|_| vars.add(variable().min(0.0))).collect(),
        };

        let mut objective = Expression::default();
        for ((params, _), sv) in sites.iter().zip(&site_vars) {
            for t in 0..steps {
                objective += sv.buy[t] * (dt * (price[t] + params.cost_e_consume));
                objective += sv.sell[t]
                    * (dt * (params.cost_e_feedin + self_consumption_penalty - price[t]));
                objective += (sv.unserved[t] + sv.surplus[t]) * (dt * FEASIBILITY_PENALTY);
            }
            objective += sv.peak * params.cost_p_consume;
        }
        for t in 0..steps {
            objective += (bat.charge[t] + bat.discharge[t]) * (dt * battery.vom);
            objective += bat.softmin[t] * (dt * battery.softmin_penalty);
        }

        let mut model = vars.minimise(objective.clone()).using(clarabel);

        for sv in &site_vars {
            for t in 0..steps {
                model = model.with(constraint!(sv.peak - sv.buy[t] >= 0.0));
            }
        }

        let sqrt_eta = battery.efficiency.sqrt();
        let retention = 1.0 - battery.loss_per_hour * dt;
        let initial_energy = battery.soc_t0 * battery.capacity;
        for t in 0..steps {
            let previous = if t == 0 {
                Expression::from(initial_energy * retention)
            } else {
                bat.state[t - 1] * retention
            };
            model = model.with(constraint!(
                bat.state[t] - previous - bat.charge[t] * (dt * sqrt_eta)
                    + bat.discharge[t] * (dt / sqrt_eta)
                    == 0.0
            ));
            model = model.with(constraint!(
                bat.state[t] + bat.softmin[t] >= battery.softmin * battery.capacity
            ));
        }

        for (index, ((_, input), sv)) in sites.iter().zip(&site_vars).enumerate() {
            let hosts_battery = layout.sites[index].name == layout.battery_site;
            for t in 0..steps {
                let mut supply: Expression =
                    sv.buy[t] - sv.sell[t] + sv.unserved[t] - sv.surplus[t];
                if hosts_battery {
                    supply += bat.discharge[t] - bat.charge[t];
                }
                model = model.with(constraint!(supply == input.net_demand[t]));
            }
        }

        let solution = model.solve().map_err(|err| match err {
            ResolutionError::Infeasible => {
                SolverError::Infeasible("day-ahead model is infeasible".to_string())
            }
            other => SolverError::Other(other.to_string()),
        })?;

        let snapshots: Vec<String> = (0..=steps).map(|k| format!("t{:04}", k)).collect();
        let mut rows = Vec::with_capacity(steps * (6 * sites.len() + 4) + sites.len() + 2);
        let charging = format!("{}.battery_charging", layout.battery_site);
        let discharging = format!("{}.battery_discharging", layout.battery_site);
        let storage = format!("{}.battery_storage", layout.battery_site);

        rows.push(ResultRow::primal(
            Some(snapshots[0].as_str()),
            &storage,
            "var",
            "state",
            initial_energy,
        ));
        for t in 0..steps {
            let snapshot = Some(snapshots[t + 1].as_str());
            for (site, sv) in layout.sites.iter().zip(&site_vars) {
                let buy = solution.value(sv.buy[t]);
                let sell = solution.value(sv.sell[t]);
                let metering = ModelLayout::metering_component(&site.name);
                let grid = format!("grid_{}", site.name);
                rows.push(ResultRow::primal(snapshot, &metering, "var", "flow", buy - sell));
                rows.push(ResultRow::primal(snapshot, &grid, "var", "buy", buy));
                rows.push(ResultRow::primal(snapshot, &grid, "var", "sell", sell));
                rows.push(ResultRow::primal(
                    snapshot,
                    &format!("{}.feasibility_unserved", site.name),
                    "exp",
                    "value",
                    solution.value(sv.unserved[t]),
                ));
                rows.push(ResultRow::primal(
                    snapshot,
                    &format!("{}.feasibility_surplus", site.name),
                    "exp",
                    "value",
                    solution.value(sv.surplus[t]),
                ));
            }
            rows.push(ResultRow::primal(
                snapshot,
                &charging,
                "exp",
                "in_electricity",
                solution.value(bat.charge[t]),
            ));
            rows.push(ResultRow::primal(
                snapshot,
                &discharging,
                "exp",
                "out_electricity",
                solution.value(bat.discharge[t]),
            ));
            rows.push(ResultRow::primal(
                snapshot,
                &storage,
                "var",
                "state",
                solution.value(bat.state[t]),
            ));
            rows.push(ResultRow::primal(
                snapshot,
                &storage,
                "var",
                "softmin",
                solution.value(bat.softmin[t]),
            ));
        }
        for (site, sv) in layout.sites.iter().zip(&site_vars) {
            rows.push(ResultRow::primal(
                None,
                &format!("grid_{}", site.name),
                "var",
                "peak",
                solution.value(sv.peak),
            ));
        }
        let objective_value = objective.eval_with(&solution);
        rows.push(ResultRow::primal(None, "model", "obj", "value", objective_value));

        let mut input_parameters: IndexMap<String, f64> = parameters
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value?.as_f64()?)))
            .collect();
        for (name, value) in [
            ("battery_eta", battery.efficiency),
            ("battery_loss", battery.loss_per_hour),
            ("battery_soc_min", battery.soc_min),
            ("battery_soc_max", battery.soc_max),
            ("battery_vom", battery.vom),
            ("battery_soc_softmin", battery.softmin),
            ("battery_soc_softmin_penalty", battery.softmin_penalty),
        ] {
            input_parameters.entry(name.to_string()).or_insert(value);
        }

        Ok(LpRun {
            snapshots,
            rows,
            input_parameters,
            objective: objective_value,
        })
    }
}

/// Solved day-ahead model.
#[derive(Debug, Clone)]
pub struct LpRun {
    snapshots: Vec<String>,
    rows: Vec<ResultRow>,
    input_parameters: IndexMap<String, f64>,
    objective: f64,
}

impl LpRun {
    /// Total cost of the schedule (EUR), penalties included.
    pub fn objective(&self) -> f64 {
        self.objective
    }
}

impl SolverRun for LpRun {
    fn input_parameter(&self, name: &str) -> Option<f64> {
        self.input_parameters.get(name).copied()
    }

    fn snapshots(&self) -> &[String] {
        &self.snapshots
    }

    fn results(&self) -> &[ResultRow] {
        &self.rows
    }
}
