//! `hf check`: dry-run a patch script

use crate::config::HotfixConfig;
use crate::demo::DemoHost;
use crate::{CliError, Result};
use clap::Args;
use console::style;
use hf_patch::check_func_with;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Patch script to load
    pub script: PathBuf,

    /// Expression evaluating to a `hotfix::FuncPatch`
    pub expr: String,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn check_command(args: CheckArgs, config: &HotfixConfig) -> Result<()> {
    let host = DemoHost::new()?;
    let script = config.resolve_script(&args.script)?;
    let plan = check_func_with(&script, &args.expr, host.symbols(), &config.apply_options())?;

    if args.json {
        let json = serde_json::to_string_pretty(&plan).map_err(|e| CliError::InvalidInput(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }
    println!("{} {} can be patched", style("✔").green(), plan.target);
    println!("  signature:   {}", plan.signature);
    println!("  replacement: {}", plan.replacement);
    println!("  patched now: {}", plan.currently_patched);
    Ok(())
}
