use std::collections::HashSet;
use std::fs::canonicalize;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use crate::cli::args::{Args, Command, ImportGdsArgs, KeyArgs, ModesArgs};
use crate::cli::progress::StepContext;
use crate::codegen::{generate_import_gds_script, save_import_gds_script};
use crate::config::waveguide::parse_waveguide_config;
use crate::modes::Waveguide;
use crate::paths::out_modes;
use crate::plan::{execute_plan, generate_plan, ExecutePlanParams, TaskKey};
use crate::solver::external::ExternalSolver;
use crate::sweep::parse_assignments;

pub mod args;
pub mod progress;

pub const BANNER: &str = r"
   ___________ ____  ____  __ __
  / ____/ ___// __ \/ __ \/ //_/
 / /    \__ \/ /_/ / / / / ,<
/ /___ ___/ / ____/ /_/ / /| |
\____//____/_/   /_____/_/ |_|

CSPDK v0.1
";

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Command::ImportGds(args) => import_gds(args),
        Command::Modes(args) => modes(args),
        Command::Key(args) => key(args),
    }
}

fn import_gds(args: ImportGdsArgs) -> anyhow::Result<()> {
    let module = args.module.as_deref();
    match args.output {
        Some(output) => {
            save_import_gds_script(&output, &args.gds_dir, module)?;
            println!("Cell module saved to: {:?}", output);
        }
        None => print!("{}", generate_import_gds_script(&args.gds_dir, module)?),
    }
    Ok(())
}

fn modes(args: ModesArgs) -> anyhow::Result<()> {
    let config_path = canonicalize(&args.config)
        .with_context(|| format!("configuration file {:?} not found", args.config))?;

    println!("{BANNER}");

    let mut tasks = HashSet::new();
    if args.output.is_some() {
        tasks.insert(TaskKey::WriteReport);
    }
    let mut ctx = StepContext::new(&tasks);

    let mut config = ctx.check(parse_waveguide_config(&config_path))?;
    config.overwrite |= args.overwrite;
    let params = ctx.check(parse_assignments(&args.set))?;
    ctx.finish(TaskKey::LoadConfig);

    let plan = ctx.check(generate_plan(&args.name, &config, &params))?;
    ctx.finish(TaskKey::GeneratePlan);

    println!("Configuration file: {:?}", &config_path);
    println!("Sweep points: {}", plan.points.len());

    let solver = ExternalSolver::builder()
        .program(args.solver)
        .args(args.solver_args)
        .build()?;

    let res = execute_plan(ExecutePlanParams {
        plan: &plan,
        solver: Arc::new(solver),
        report_path: args.output.as_deref(),
        ctx: Some(&mut ctx),
    });
    let report = ctx.check(res)?;

    for point in &report.points {
        println!("{} (key {}):", point.label, point.cache_key);
        for (wavelength, n_eff) in point.wavelength.iter().zip(&point.n_eff) {
            let n_eff = n_eff
                .iter()
                .map(|n| format!("{n:.6}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("\t{wavelength} um: n_eff = [{n_eff}]");
        }
    }
    if let Some(output) = &args.output {
        println!("Report saved to: {:?}\n", output);
    }

    Ok(())
}

fn key(args: KeyArgs) -> anyhow::Result<()> {
    let config = parse_waveguide_config(&args.config)
        .with_context(|| format!("failed to read configuration file {:?}", args.config))?;
    let params = parse_assignments(&args.set)?;
    let plan = generate_plan("waveguide", &config, &params)?;

    for point in plan.points {
        let key = point.config.cache_key();
        match &point.config.cache_path {
            Some(dir) => {
                let path = out_modes(dir, Waveguide::TYPE_NAME, &key);
                println!("{}\t{}\t{}", point.label, key, path.display());
            }
            None => println!("{}\t{}", point.label, key),
        }
    }
    Ok(())
}
