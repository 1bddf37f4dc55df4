use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cli::progress::StepContext;
use crate::config::waveguide::WaveguideConfig;
use crate::modes::Waveguide;
use crate::solver::ModeSolver;
use crate::sweep::{expand_sweep, save_name, ParamValue};
use crate::Result;

/// One configuration to solve.
#[derive(Debug, Clone)]
pub struct ModePoint {
    pub label: String,
    pub config: WaveguideConfig,
}

/// A concrete plan: the sweep points of a waveguide study.
#[derive(Debug, Clone)]
pub struct ModePlan {
    pub name: String,
    pub points: Vec<ModePoint>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKey {
    LoadConfig,
    GeneratePlan,
    SolveModes,
    WriteReport,
}

pub struct ExecutePlanParams<'a> {
    pub plan: &'a ModePlan,
    pub solver: Arc<dyn ModeSolver>,
    pub report_path: Option<&'a Path>,
    pub ctx: Option<&'a mut StepContext>,
}

/// Results for one sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointReport {
    pub label: String,
    pub cache_key: String,
    pub cache_file: Option<PathBuf>,
    pub wavelength: Vec<f64>,
    /// Real part of the effective index, indexed `[wavelength][mode]`.
    pub n_eff: Vec<Vec<f64>>,
    pub n_eff_imag: Vec<Vec<f64>>,
    pub n_group: Option<Vec<Vec<f64>>>,
    pub loss_db_per_cm: Vec<Vec<f64>>,
    pub fraction_te: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeReport {
    pub name: String,
    pub points: Vec<PointReport>,
}

fn rows(array: &Array2<f64>) -> Vec<Vec<f64>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

/// Applies `params` to `config`, one point per sweep value.
pub fn generate_plan(
    name: &str,
    config: &WaveguideConfig,
    params: &BTreeMap<String, ParamValue>,
) -> Result<ModePlan> {
    config.validate()?;
    let points = expand_sweep(params)?
        .into_iter()
        .map(|point| {
            let mut config = config.clone();
            for (param, value) in point.iter() {
                config.set(param, value)?;
            }
            let label = if point.is_empty() {
                name.to_string()
            } else {
                save_name(name, &point)
            };
            Ok(ModePoint { label, config })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ModePlan {
        name: name.to_string(),
        points,
    })
}

macro_rules! try_finish_task {
    ( $ctx:expr, $task:expr ) => {
        if let Some(ctx) = $ctx.as_mut() {
            ctx.finish($task);
        }
    };
}

pub fn solve_point(point: &ModePoint, solver: Arc<dyn ModeSolver>) -> Result<PointReport> {
    let waveguide = Waveguide::new(point.config.clone(), solver)?;
    let n_eff = waveguide.n_eff()?;

    Ok(PointReport {
        label: point.label.clone(),
        cache_key: waveguide.cache_key(),
        cache_file: waveguide.filepath()?,
        wavelength: point.config.wavelength.as_slice().to_vec(),
        n_eff: rows(&n_eff.mapv(|n| n.re)),
        n_eff_imag: rows(&n_eff.mapv(|n| n.im)),
        n_group: waveguide.n_group()?.map(rows),
        loss_db_per_cm: rows(waveguide.loss_db_per_cm()?),
        fraction_te: waveguide.fraction_te()?.to_vec(),
    })
}

pub fn save_report(path: impl AsRef<Path>, report: &ModeReport) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!("wrote report to {:?}", path);
    Ok(())
}

pub fn execute_plan(params: ExecutePlanParams) -> Result<ModeReport> {
    let ExecutePlanParams {
        plan,
        solver,
        report_path,
        mut ctx,
    } = params;

    let points = plan
        .points
        .iter()
        .map(|point| {
            info!("solving {}", point.label);
            solve_point(point, solver.clone())
        })
        .collect::<Result<Vec<_>>>()?;
    try_finish_task!(ctx, TaskKey::SolveModes);

    let report = ModeReport {
        name: plan.name.clone(),
        points,
    };

    if let Some(path) = report_path {
        save_report(path, &report)?;
        try_finish_task!(ctx, TaskKey::WriteReport);
    }

    Ok(report)
}
