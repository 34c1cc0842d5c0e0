use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use rosetta_fold::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;
const DRAW_HZ: u8 = 12;

/// Terminal view of a folding run: one status line for the current phase and, while
/// trajectories run, a bar counting finished models. Model summaries scroll above.
struct FoldView {
    multi: MultiProgress,
    status: ProgressBar,
    models: Option<ProgressBar>,
    phase: &'static str,
}

impl FoldView {
    fn new(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let status = multi.add(ProgressBar::new_spinner().with_style(status_style()));
        status.finish_and_clear();
        Self {
            multi,
            status,
            models: None,
            phase: "",
        }
    }

    fn handle(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.phase = name;
                self.status.reset();
                self.status.set_message(name);
                self.status
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::PhaseFinish => {
                self.status.disable_steady_tick();
                self.status.finish_with_message(format!("✓ {}", self.phase));
            }
            Progress::TaskStart { total_steps } => {
                if let Some(previous) = self.models.take() {
                    previous.finish_and_clear();
                }
                let bar = self
                    .multi
                    .add(ProgressBar::new(total_steps).with_style(models_style()));
                bar.set_message("models");
                self.models = Some(bar);
            }
            Progress::TaskIncrement => {
                if let Some(bar) = &self.models {
                    bar.inc(1);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = &self.models {
                    bar.finish();
                }
            }
            Progress::RoundFinish {
                round,
                rounds,
                lowest_score,
            } => self.status.set_message(round_line(self.phase, round, rounds, lowest_score)),
            Progress::TrajectoryFinish { index, summary } => {
                self.print(model_line(index, &summary));
            }
            Progress::Message(msg) => self.print(format!("  {msg}")),
        }
    }

    fn print(&self, line: String) {
        if self.multi.println(&line).is_err() {
            warn!("Could not write progress line: {line}");
        }
    }
}

fn round_line(phase: &str, round: usize, rounds: usize, lowest_score: f64) -> String {
    format!("{phase}: round {round}/{rounds}, lowest {lowest_score:.2}")
}

fn model_line(index: usize, summary: &str) -> String {
    format!("  model_{:04}  {summary}", index + 1)
}

fn status_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn models_style() -> ProgressStyle {
    ProgressStyle::with_template("  {msg:<8} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "elapsed",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.elapsed().as_secs_f64());
            },
        )
        .progress_chars("=> ")
}

/// Thread-safe sink that feeds library progress events into the terminal view.
#[derive(Clone)]
pub struct CliProgressHandler {
    view: Arc<Mutex<FoldView>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr_with_hz(DRAW_HZ))
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            view: Arc::new(Mutex::new(FoldView::new(target))),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let view = Arc::clone(&self.view);
        Box::new(move |progress: Progress| match view.lock() {
            Ok(mut view) => view.handle(progress),
            Err(_) => warn!("Progress view mutex was poisoned; dropping event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
