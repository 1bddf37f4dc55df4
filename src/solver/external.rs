//! A [`ModeSolver`] backed by an external program.
//!
//! The program receives the [`RectangularDielectric`] as JSON on stdin and
//! must print a [`ModeSolution`] as JSON on stdout. Arrays use the `ndarray`
//! serde layout (`{"v": 1, "dim": [...], "data": [...]}`) and complex numbers
//! are `[re, im]` pairs.
//!
//! ```no_run
//! use cspdk::solver::external::ExternalSolverBuilder;
//!
//! let solver = ExternalSolverBuilder::default()
//!     .program("cspdk-mode-solver")
//!     .args(vec!["--gpu".to_string()])
//!     .build()
//!     .unwrap();
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use derive_builder::Builder;
use log::debug;

use super::{ModeSolution, ModeSolver, RectangularDielectric, SolutionShape};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Builder)]
#[builder(derive(Debug), setter(into))]
pub struct ExternalSolver {
    program: PathBuf,
    #[builder(default)]
    args: Vec<String>,
    /// Working directory of the solver process.
    #[builder(default, setter(into, strip_option))]
    cwd: Option<PathBuf>,
}

impl ExternalSolver {
    pub fn builder() -> ExternalSolverBuilder {
        ExternalSolverBuilder::default()
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl ModeSolver for ExternalSolver {
    fn solve(&self, simulation: &RectangularDielectric) -> Result<ModeSolution> {
        let request = serde_json::to_vec(simulation)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        debug!(
            "running mode solver {:?} with args {:?} ({} wavelengths, {} modes)",
            self.program,
            self.args,
            simulation.wavelength.len(),
            simulation.mode_spec.num_modes
        );
        let mut child = cmd.spawn().map_err(|e| {
            Error::Solver(format!("failed to start {:?}: {e}", self.program))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request)?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(Error::Solver(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let solution: ModeSolution = serde_json::from_slice(&output.stdout)?;
        solution.check(SolutionShape::of(simulation))?;
        debug!(
            "mode solver returned a {}x{} grid",
            solution.x.len(),
            solution.y.len()
        );
        Ok(solution)
    }
}
