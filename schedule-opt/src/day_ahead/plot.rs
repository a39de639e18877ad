use std::path::Path;

use plotters::prelude::*;

use crate::day_ahead::layout::{BATTERY_SETPOINT_COLUMN, BATTERY_SOC_COLUMN};
use crate::day_ahead::results::ScheduleResult;

const SERIES_COLORS: [RGBColor; 5] = [BLUE, RED, GREEN, MAGENTA, CYAN];

fn value_range<'a>(series: impl Iterator<Item = &'a [f64]>) -> (f64, f64) {
    let (min, max) = series
        .flat_map(|values| values.iter().copied())
        .filter(|value| value.is_finite())
        .fold((0f64, 0f64), |(lo, hi), value| (lo.min(value), hi.max(value)));
    if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

/// Draw the power columns (kW) in the upper panel and the battery state of
/// charge in the lower panel. The x axis is the interval index.
pub fn plot_schedule(
    result: &ScheduleResult,
    filename: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if result.is_empty() {
        return Err("cannot plot an empty schedule".into());
    }
    let soc = result
        .column(BATTERY_SOC_COLUMN)
        .ok_or("schedule has no battery state of charge")?;
    let power: Vec<(&str, &[f64])> = result
        .column_names()
        .filter(|name| name.ends_with("_kW"))
        .filter_map(|name| result.column(name).map(|values| (name, values)))
        .collect();

    let root = BitMapBackend::new(filename, (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((2, 1));
    let upper = &areas[0];
    let lower = &areas[1];
    let steps = result.len() as f64;

    let (p_min, p_max) = value_range(power.iter().map(|(_, values)| *values));
    let mut chart1 = ChartBuilder::on(upper)
        .caption("Day-ahead schedule", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..steps, p_min..p_max)?;
    chart1
        .configure_mesh()
        .x_desc("Interval")
        .y_desc("Power (kW)")
        .draw()?;

    for (index, (name, values)) in power.iter().enumerate() {
        let color = SERIES_COLORS[index % SERIES_COLORS.len()];
        let stroke = if *name == BATTERY_SETPOINT_COLUMN { 2 } else { 1 };
        chart1
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, &y)| (i as f64, y)),
                color.stroke_width(stroke),
            ))?
            .label(*name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }
    chart1
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let mut chart2 = ChartBuilder::on(lower)
        .caption("Battery state of charge", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..steps, 0f64..1f64)?;
    chart2
        .configure_mesh()
        .x_desc("Interval")
        .y_desc("SoC")
        .draw()?;
    chart2.draw_series(LineSeries::new(
        soc.iter().enumerate().map(|(i, &y)| (i as f64, y)),
        &BLUE,
    ))?;

    root.present()?;
    tracing::info!("Plot saved as {}", filename.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::time_series::TimeSeriesTable;
    use indexmap::IndexMap;

    #[test]
    fn test_empty_schedule_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            plot_schedule(&TimeSeriesTable::default(), &dir.path().join("plot.png")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_schedule_without_soc_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut columns = IndexMap::new();
        columns.insert(BATTERY_SETPOINT_COLUMN.to_string(), vec![1.0, 2.0]);
        let result = TimeSeriesTable::from_columns(columns).unwrap();

        let err = plot_schedule(&result, &dir.path().join("plot.png")).unwrap_err();
        assert!(err.to_string().contains("state of charge"));
    }

    #[test]
    fn test_value_range_widens_flat_series() {
        let flat = [5.0, 5.0];
        assert_eq!(value_range([&flat[..]].into_iter()), (0.0, 5.0));
        let zeros = [0.0];
        assert_eq!(value_range([&zeros[..]].into_iter()), (-1.0, 1.0));
    }
}
