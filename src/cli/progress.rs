use std::collections::HashSet;
use std::time::{Duration, Instant};

use colored::{ColoredString, Colorize};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::plan::TaskKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Pending,
    InProgress,
    Disabled,
    Skipped,
    Failed,
}

impl StepStatus {
    fn label(&self) -> ColoredString {
        match self {
            StepStatus::Disabled => "Disabled".truecolor(120, 120, 120).bold(),
            StepStatus::Done => "Done".green().bold(),
            StepStatus::Failed => "Failed".bright_white().on_red().bold(),
            StepStatus::InProgress => "In Progress".bright_white().bold(),
            StepStatus::Pending => "Pending".blue().bold(),
            StepStatus::Skipped => "Skipped".yellow().bold(),
        }
    }

    fn template(&self) -> String {
        let label = self.label();
        match self {
            StepStatus::Pending | StepStatus::InProgress => {
                format!("{{spinner:.green}} {label:16} {{msg}}")
            }
            _ => format!("  {label:16} {{msg}}"),
        }
    }
}

/// Terminal display of the `modes` pipeline, one spinner per task.
pub struct StepContext {
    step_num: usize,
    steps: Vec<Step>,
    started: Instant,
}

pub struct Step {
    desc: &'static str,
    key: TaskKey,
    progress_bar: ProgressBar,
    disabled: bool,
    status: StepStatus,
}

impl Step {
    fn new(desc: &'static str, key: TaskKey, disabled: bool) -> Self {
        Self {
            desc,
            key,
            progress_bar: ProgressBar::new_spinner(),
            disabled,
            status: StepStatus::Pending,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    fn set_status(&mut self, status: StepStatus, msg: Option<String>) {
        if let Ok(style) = ProgressStyle::with_template(&status.template()) {
            self.progress_bar.set_style(style);
        }
        if let Some(msg) = msg {
            self.progress_bar.set_message(msg);
        }
        match status {
            StepStatus::Pending => {}
            StepStatus::InProgress => self
                .progress_bar
                .enable_steady_tick(Duration::from_millis(200)),
            _ => self.progress_bar.finish(),
        }
        self.status = status;
    }
}

impl StepContext {
    /// Creates the step display; steps not in `tasks` are shown as disabled.
    pub fn new(tasks: &HashSet<TaskKey>) -> Self {
        println!("Tasks:");

        let mut steps = vec![
            Step::new("Load configuration", TaskKey::LoadConfig, false),
            Step::new("Generate sweep plan", TaskKey::GeneratePlan, false),
            Step::new("Solve modes", TaskKey::SolveModes, false),
            Step::new(
                "Write report",
                TaskKey::WriteReport,
                !tasks.contains(&TaskKey::WriteReport),
            ),
        ];

        let mp = MultiProgress::new();
        let enabled = steps.iter().filter(|step| !step.disabled).count();
        let width = enabled.to_string().len();
        let mut position = 0;
        for step in steps.iter_mut() {
            mp.add(step.progress_bar.clone());
            if step.disabled {
                let msg = format!("[{:>width$}/{:>width$}] {}", "-", "-", step.desc);
                step.set_status(StepStatus::Disabled, Some(msg));
            } else {
                position += 1;
                let msg = format!("[{position:width$}/{enabled:width$}] {}", step.desc);
                step.set_status(StepStatus::Pending, Some(msg));
            }
        }

        let mut ctx = StepContext {
            step_num: 0,
            steps,
            started: Instant::now(),
        };
        ctx.skip_disabled();
        ctx.start_current();
        ctx
    }

    #[inline]
    pub fn current_step(&mut self) -> Option<&mut Step> {
        self.steps.get_mut(self.step_num)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Moves past the current step and any disabled steps after it.
    pub fn advance(&mut self) {
        self.step_num += 1;
        self.skip_disabled();
    }

    fn skip_disabled(&mut self) {
        while self.steps.get(self.step_num).map_or(false, |step| step.disabled) {
            self.step_num += 1;
        }
    }

    /// Marks the current step as in progress. Returns `false` once every step is finished.
    fn start_current(&mut self) -> bool {
        match self.current_step() {
            Some(step) => {
                step.set_status(StepStatus::InProgress, None);
                true
            }
            None => false,
        }
    }

    /// Fails the current step and skips the remaining ones if `res` is an error.
    pub fn check<T, E>(&mut self, res: std::result::Result<T, E>) -> std::result::Result<T, E> {
        if res.is_err() {
            let start = self.step_num.min(self.steps.len());
            if let Some((current, rest)) = self.steps[start..].split_first_mut() {
                current.set_status(StepStatus::Failed, None);
                for step in rest.iter_mut().filter(|step| !step.disabled) {
                    step.set_status(StepStatus::Skipped, None);
                }
                self.step_num = self.steps.len();
            }
            println!();
        }
        res
    }

    pub fn finish(&mut self, key: TaskKey) {
        let Some(step) = self.current_step() else {
            panic!("task {key:?} finished after all tasks were completed");
        };
        assert_eq!(step.key, key, "task {key:?} finished out of order");
        step.set_status(StepStatus::Done, None);

        self.advance();
        if !self.start_current() {
            self.done();
        }
    }

    fn done(&self) {
        let finished = self.steps.iter().filter(|step| !step.disabled).count();
        println!(
            "\n\nCompleted {finished} tasks in {:.1?}",
            self.started.elapsed()
        );
    }
}
