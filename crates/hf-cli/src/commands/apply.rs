//! `hf apply`: patch the demo service in-process and show the effect

use crate::config::HotfixConfig;
use crate::demo::DemoHost;
use crate::Result;
use clap::Args;
use console::style;
use hf_patch::apply_func_with;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct ApplyArgs {
    /// Patch script to load
    pub script: PathBuf,

    /// Expression evaluating to a `hotfix::FuncPatch`
    pub expr: String,

    /// Request path passed to the patched method before and after
    #[arg(long, default_value = "/")]
    pub call: String,
}

pub async fn apply_command(args: ApplyArgs, config: &HotfixConfig) -> Result<()> {
    let host = DemoHost::new()?;
    let script = config.resolve_script(&args.script)?;
    let handle = apply_func_with(&script, &args.expr, host.symbols(), &config.apply_options())?;
    let method = handle.slot().name();
    let before = host.call_original(method, &args.call)?;
    let after = host.call(method, &args.call)?;

    println!("{} applied patch #{} to {}", style("✔").green(), handle.id(), handle.target());
    println!("  before: {before}");
    println!("  after:  {after}");
    Ok(())
}
