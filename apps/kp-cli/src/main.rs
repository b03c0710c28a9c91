use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use kp_core::timing::{self, Timer};
use kp_core::{CoreError, DelayedNeutronData, ensure_positive};
use kp_session::{
    InteractiveSession, ManualClock, SessionConfig, SessionError, SessionEvent, StepOutcome,
    TimeSource, WallClock,
};
use kp_sim::inhour;
use kp_sim::{KineticsSolver, PointKinetics, SimError, Step, StepSchedule, prompt_jump};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod output;

use output::Format;

/// Normalized generation time for a 0.1 us prompt lifetime at beta = 0.0035.
const DEFAULT_GENERATION_TIME: f64 = 1e-7 / 0.0035;

/// Control range of the reactivity input, in dollars.
const RHO_MIN: f64 = -5.0;
const RHO_MAX: f64 = 1.0;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "kp-cli")]
#[command(about = "Keep-in-pace - interactive point-kinetics reactor simulation", long_about = None)]
struct Cli {
    /// Log timing of solves (same as setting KP_TIMING)
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Delayed-neutron data YAML file (defaults to Keepin U-235)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Normalized generation time Lambda
    #[arg(long, default_value_t = DEFAULT_GENERATION_TIME)]
    generation_time: f64,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive an interactive session with a scripted reactivity schedule
    Run {
        #[command(flatten)]
        model: ModelArgs,
        /// Session configuration YAML (horizon, sample spacing, solver)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Reactivity change as TIME:RHO (repeatable)
        #[arg(long = "set", value_parser = parse_step)]
        changes: Vec<Step>,
        /// Session length in simulation units
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Interval between session steps
        #[arg(long, default_value_t = 0.05)]
        tick: f64,
        /// Follow real time, scaled by this factor, instead of a scripted clock
        #[arg(long)]
        realtime: Option<f64>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Solve a fixed reactivity schedule in one pass
    Solve {
        #[command(flatten)]
        model: ModelArgs,
        /// Reactivity before the first step
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        rho: f64,
        /// Reactivity step as TIME:RHO (repeatable)
        #[arg(long = "step", value_parser = parse_step)]
        steps: Vec<Step>,
        #[arg(long, default_value_t = 10.0)]
        end: f64,
        /// Largest integrator step
        #[arg(long)]
        max_step: Option<f64>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Asymptotic period for reactivity steps from critical
    Inhour {
        #[command(flatten)]
        model: ModelArgs,
        /// Reactivity in dollars (repeatable)
        #[arg(long = "rho", required = true, allow_hyphen_values = true)]
        rhos: Vec<f64>,
    },
    /// Print a delayed-neutron data set as YAML
    Data {
        /// Data file to validate and echo (defaults to Keepin U-235)
        path: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.timing {
        timing::enable_timing();
    }

    match cli.command {
        Commands::Run {
            model,
            config,
            changes,
            duration,
            tick,
            realtime,
            out,
        } => cmd_run(
            &model,
            config.as_deref(),
            changes,
            duration,
            tick,
            realtime,
            &out,
        ),
        Commands::Solve {
            model,
            rho,
            steps,
            end,
            max_step,
            out,
        } => cmd_solve(&model, rho, steps, end, max_step, &out),
        Commands::Inhour { model, rhos } => cmd_inhour(&model, &rhos),
        Commands::Data { path } => cmd_data(path.as_deref()),
    }
}

fn parse_step(s: &str) -> Result<Step, String> {
    let (t, rho) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TIME:RHO, got '{s}'"))?;
    let t = t.trim().parse().map_err(|e| format!("bad time '{t}': {e}"))?;
    let rho = rho
        .trim()
        .parse()
        .map_err(|e| format!("bad reactivity '{rho}': {e}"))?;
    Ok(Step { t, rho })
}

fn load_data(path: Option<&Path>) -> CliResult<DelayedNeutronData> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&text)?)
        }
        None => Ok(DelayedNeutronData::keepin_u235()),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<SessionConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&text)?)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn positive(value: f64, what: &'static str) -> CliResult<f64> {
    Ok(ensure_positive(value, what)?)
}

fn clamp_reactivity(rho: f64) -> f64 {
    let clamped = rho.clamp(RHO_MIN, RHO_MAX);
    if clamped != rho {
        tracing::warn!(requested = rho, applied = clamped, "reactivity clamped");
    }
    clamped
}

fn cmd_run(
    model: &ModelArgs,
    config_path: Option<&Path>,
    mut changes: Vec<Step>,
    duration: f64,
    tick: f64,
    realtime: Option<f64>,
    out: &OutputArgs,
) -> CliResult<()> {
    let duration = positive(duration, "duration")?;
    let tick = positive(tick, "tick")?;
    let data = load_data(model.data.as_deref())?;
    let config = load_config(config_path)?;
    changes.sort_by(|a, b| a.t.total_cmp(&b.t));

    let timer = Timer::start("session run");
    let past = match realtime {
        Some(scale) => {
            let clock = WallClock::with_time_scale(scale)?;
            let mut session =
                InteractiveSession::new(data, model.generation_time, config, clock)?;
            let end = drive(&mut session, &changes, duration, tick, |s, target| {
                let ahead = target - s.current_elapsed();
                if ahead > 0.0 {
                    std::thread::sleep(Duration::from_secs_f64(ahead / scale));
                }
                Ok(())
            })?;
            report(&session, end);
            session.past().clone()
        }
        None => {
            let mut session = InteractiveSession::new(
                data,
                model.generation_time,
                config,
                ManualClock::new(0.0),
            )?;
            let end = drive(&mut session, &changes, duration, tick, |s, target| {
                Ok(s.clock_mut().set(target)?)
            })?;
            report(&session, end);
            session.past().clone()
        }
    };
    timer.stop_and_log();

    output::emit(&output::render(&past, out.format)?, out.output.as_deref())
}

/// How a scripted run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    /// The session could not produce a future; its past is still valid.
    Frozen,
}

/// Tick the session until `duration`, applying scheduled reactivity changes.
fn drive<C: TimeSource>(
    session: &mut InteractiveSession<C>,
    changes: &[Step],
    duration: f64,
    tick: f64,
    mut wait_until: impl FnMut(&mut InteractiveSession<C>, f64) -> CliResult<()>,
) -> CliResult<RunEnd> {
    session.subscribe(|event: &SessionEvent| match event {
        SessionEvent::FutureReplaced {
            start,
            samples,
            reactivity,
            ..
        } => tracing::debug!(start, samples, reactivity, "future replaced"),
        SessionEvent::ResolveFailed { now, reason } => {
            tracing::error!(now, reason = reason.as_str(), "re-solve failed")
        }
        SessionEvent::Advanced { .. } => {}
    });

    let mut pending = changes.iter().peekable();
    let mut target = 0.0;
    while target < duration {
        target = (target + tick).min(duration);
        wait_until(session, target)?;
        match freeze_on_solver_failure(session.step())? {
            Some(StepOutcome::Advanced { .. }) => {}
            Some(StepOutcome::Exhausted) | None => return Ok(RunEnd::Frozen),
        }

        let now = session.current_elapsed();
        while let Some(change) = pending.next_if(|c| c.t <= now) {
            let rho = clamp_reactivity(change.rho);
            let Some(applied) = freeze_on_solver_failure(session.set_reactivity(rho))? else {
                return Ok(RunEnd::Frozen);
            };
            tracing::info!(
                t = now,
                rho = applied.current,
                prompt_jump = ?applied.prompt_jump,
                "applied scheduled change"
            );
        }
    }
    Ok(RunEnd::Completed)
}

/// A solver failure freezes the run; anything else is a real error.
fn freeze_on_solver_failure<T>(result: Result<T, SessionError>) -> CliResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SessionError::Sim(e)) => {
            tracing::warn!(error = %e, "solver failed, freezing the session");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn report<C: TimeSource>(session: &InteractiveSession<C>, end: RunEnd) {
    let stats = session.solve_stats();
    let state = session.current_state();
    tracing::info!(
        t = session.past().last_time().unwrap_or(0.0),
        n = state.neutron_density(),
        rho = session.current_reactivity(),
        past = session.past().len(),
        solves = stats.solves,
        solve_s = stats.total_seconds,
        frozen = end == RunEnd::Frozen,
        "session finished"
    );
}

fn cmd_solve(
    model: &ModelArgs,
    rho: f64,
    mut steps: Vec<Step>,
    end: f64,
    max_step: Option<f64>,
    out: &OutputArgs,
) -> CliResult<()> {
    let end = positive(end, "end time")?;
    steps.sort_by(|a, b| a.t.total_cmp(&b.t));
    let data = load_data(model.data.as_deref())?;
    let schedule = StepSchedule::new(rho, steps)?;

    let mut options = kp_sim::AdaptiveOptions::default();
    if let Some(h) = max_step {
        options = options.with_max_step(positive(h, "max step")?);
    }
    let mut solver =
        KineticsSolver::with_options(data, schedule, model.generation_time, options)?;

    let timer = Timer::start("solve");
    let trajectory = solver.solve(0.0, end)?;
    timer.stop_and_log();

    let stats = solver.last_stats();
    tracing::info!(
        samples = trajectory.len(),
        accepted = stats.accepted,
        rejected = stats.rejected,
        n_end = solver.state().neutron_density(),
        "solve finished"
    );

    output::emit(&output::render(&trajectory, out.format)?, out.output.as_deref())
}

fn cmd_inhour(model: &ModelArgs, rhos: &[f64]) -> CliResult<()> {
    let data = load_data(model.data.as_deref())?;
    let kinetics = PointKinetics::new(data, model.generation_time)?;

    println!(
        "{:>10}  {:>14}  {:>14}  {:>12}",
        "rho ($)", "omega (1/s)", "period (s)", "prompt jump"
    );
    for &rho in rhos {
        let omega = inhour::dominant_root(&kinetics, rho)?;
        let period = inhour::asymptotic_period(&kinetics, rho)?;
        let jump = prompt_jump(0.0, rho, 1.0)
            .map_or_else(|| "-".to_string(), |n| format!("{n:.4}"));
        println!("{rho:>10.4}  {omega:>14.6e}  {period:>14.6e}  {jump:>12}");
    }
    Ok(())
}

fn cmd_data(path: Option<&Path>) -> CliResult<()> {
    let data = load_data(path)?;
    tracing::info!(
        groups = data.num_groups(),
        beta = data.total_fraction(),
        mean_lifetime = data.mean_lifetime(),
        "delayed-neutron data"
    );
    print!("{}", serde_yaml::to_string(&data)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_reactivity_pairs() {
        assert_eq!(
            parse_step("1.5:-0.25").unwrap(),
            Step {
                t: 1.5,
                rho: -0.25
            }
        );
        assert_eq!(parse_step(" 2 : 0.1 ").unwrap(), Step { t: 2.0, rho: 0.1 });
        assert!(parse_step("1.5").is_err());
        assert!(parse_step("a:0.1").is_err());
    }

    #[test]
    fn clamps_to_control_range() {
        assert_eq!(clamp_reactivity(3.0), 1.0);
        assert_eq!(clamp_reactivity(-7.0), -5.0);
        assert_eq!(clamp_reactivity(0.2), 0.2);
    }

    #[test]
    fn scripted_run_applies_changes() {
        let mut session = InteractiveSession::new(
            DelayedNeutronData::keepin_u235(),
            DEFAULT_GENERATION_TIME,
            SessionConfig::default().with_horizon(2.0),
            ManualClock::new(0.0),
        )
        .unwrap();
        let changes = [Step { t: 0.5, rho: 0.2 }];
        let end = drive(&mut session, &changes, 1.0, 0.1, |s, t| {
            Ok(s.clock_mut().set(t)?)
        })
        .unwrap();
        assert_eq!(end, RunEnd::Completed);
        assert_eq!(session.current_reactivity(), 0.2);
        assert!(session.current_state().neutron_density() > 1.1);
        assert!(session.past().last_time().unwrap() <= 1.0);
    }

    #[test]
    fn prompt_critical_run_freezes_and_keeps_the_past() {
        let mut session = InteractiveSession::new(
            DelayedNeutronData::keepin_u235(),
            DEFAULT_GENERATION_TIME,
            SessionConfig::default(),
            ManualClock::new(0.0),
        )
        .unwrap();
        let changes = [Step { t: 1.0, rho: 1.0 }];
        let end = drive(&mut session, &changes, 10.0, 0.1, |s, t| {
            Ok(s.clock_mut().set(t)?)
        })
        .unwrap();

        assert_eq!(end, RunEnd::Frozen);
        assert_eq!(session.phase(), kp_session::SessionPhase::Exhausted);
        assert!(session.past().last_time().unwrap() >= 0.95);
        let csv = output::render(session.past(), Format::Csv).unwrap();
        assert!(csv.lines().count() > 2);
    }

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from([
            "kp-cli", "run", "--set", "1:0.2", "--set", "2:-0.5", "--duration", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { changes, .. } => assert_eq!(changes.len(), 2),
            _ => panic!("expected run"),
        }
    }
}
