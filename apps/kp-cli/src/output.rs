//! Writing trajectories as CSV or JSON.

use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use kp_sim::Trajectory;
use serde::Serialize;

use crate::CliResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Csv,
    Json,
}

#[derive(Serialize)]
struct Row<'a> {
    t: f64,
    n: f64,
    precursors: &'a [f64],
}

pub fn render(trajectory: &Trajectory, format: Format) -> CliResult<String> {
    match format {
        Format::Csv => Ok(to_csv(trajectory)),
        Format::Json => {
            let rows: Vec<Row<'_>> = trajectory
                .iter()
                .map(|s| Row {
                    t: s.t,
                    n: s.neutron_density(),
                    precursors: s.state.precursors(),
                })
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
    }
}

fn to_csv(trajectory: &Trajectory) -> String {
    let groups = trajectory.first().map_or(0, |s| s.state.num_groups());
    let mut csv = String::from("t,n");
    for i in 1..=groups {
        csv.push_str(&format!(",c{i}"));
    }
    csv.push('\n');
    for sample in trajectory.iter() {
        csv.push_str(&format!("{},{}", sample.t, sample.neutron_density()));
        for c in sample.state.precursors() {
            csv.push_str(&format!(",{c}"));
        }
        csv.push('\n');
    }
    csv
}

/// Write to `path`, or to stdout when no path is given.
pub fn emit(contents: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(path) => std::fs::write(path, contents)?,
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(contents.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_sim::KineticsState;

    fn two_samples() -> Trajectory {
        let mut traj = Trajectory::new();
        traj.push(0.0, KineticsState::from_parts(1.0, &[2.0, 3.0]))
            .unwrap();
        traj.push(0.5, KineticsState::from_parts(1.5, &[2.5, 3.5]))
            .unwrap();
        traj
    }

    #[test]
    fn csv_has_one_column_per_group() {
        let csv = render(&two_samples(), Format::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "t,n,c1,c2");
        assert_eq!(lines[2], "0.5,1.5,2.5,3.5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn json_rows_parse_back() {
        let json = render(&two_samples(), Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[1]["n"], 1.5);
        assert_eq!(value[0]["precursors"][1], 3.0);
    }
}
