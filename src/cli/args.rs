use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a Rust module with one function per GDS file.
    ImportGds(ImportGdsArgs),
    /// Solve (or load cached) waveguide modes, optionally over a parameter sweep.
    Modes(ModesArgs),
    /// Print the cache key and cache file of a waveguide configuration.
    Key(KeyArgs),
}

#[derive(clap::Args, Debug)]
pub struct ImportGdsArgs {
    /// Directory containing the GDS files.
    #[arg(short, long)]
    pub gds_dir: PathBuf,

    /// Module path of the generated file, used in doc examples.
    #[arg(short, long)]
    pub module: Option<String>,

    /// File to which the module should be written. Printed to stdout if omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ModesArgs {
    /// Path to TOML waveguide configuration file.
    #[arg(short, long, default_value = "waveguide.toml")]
    pub config: PathBuf,

    /// Name used to label sweep points.
    #[arg(short, long, default_value = "waveguide")]
    pub name: String,

    /// Mode solver program.
    #[arg(long, env = "CSPDK_MODE_SOLVER", default_value = "cspdk-mode-solver")]
    pub solver: PathBuf,

    /// Extra argument passed to the mode solver. May be repeated.
    #[arg(long = "solver-arg", allow_hyphen_values = true)]
    pub solver_args: Vec<String>,

    /// Override a setting, as `name=value`. A comma-separated value sweeps the setting.
    #[arg(short, long = "set")]
    pub set: Vec<String>,

    /// Recompute modes even if cached data exists.
    #[arg(long)]
    pub overwrite: bool,

    /// File to which a JSON report should be written.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Path to TOML waveguide configuration file.
    #[arg(short, long, default_value = "waveguide.toml")]
    pub config: PathBuf,

    /// Override a setting, as `name=value`. A comma-separated value sweeps the setting.
    #[arg(short, long = "set")]
    pub set: Vec<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_modes() {
        let args = Args::try_parse_from([
            "cspdk",
            "modes",
            "--solver",
            "/opt/solver",
            "--solver-arg",
            "--gpu",
            "--set",
            "core_width=0.8,1.0",
            "--overwrite",
        ])
        .unwrap();
        let Command::Modes(modes) = args.command else {
            panic!("expected the modes command");
        };
        assert_eq!(modes.solver, PathBuf::from("/opt/solver"));
        assert_eq!(modes.solver_args, vec!["--gpu".to_string()]);
        assert_eq!(modes.set, vec!["core_width=0.8,1.0".to_string()]);
        assert!(modes.overwrite);
        assert_eq!(modes.config, PathBuf::from("waveguide.toml"));
    }

    #[test]
    fn test_import_gds_requires_dir() {
        assert!(Args::try_parse_from(["cspdk", "import-gds"]).is_err());
    }
}
