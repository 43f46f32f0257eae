//! `hf symbols`: list every name a patch script can import

use crate::config::HotfixConfig;
use crate::demo::DemoHost;
use crate::{CliError, Result};
use clap::Args;
use console::style;
use hf_core::{SymbolTable, Value};
use hf_interpret::stdlib::base_symbols;
use hf_patch::hotfix_symbols;
use serde::Serialize;

#[derive(Debug, Clone, Args)]
pub struct SymbolsArgs {
    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolEntry {
    pub package: String,
    pub name: String,
    pub set: String,
    pub kind: String,
}

/// Base sets, then `hotfix`, then the demo service, in the order scripts see them.
pub fn script_symbols(host: &DemoHost) -> Result<SymbolTable> {
    let table = base_symbols()?.merge(&hotfix_symbols()?)?.merge(host.symbols())?;
    Ok(table)
}

pub fn list_symbols(table: &SymbolTable) -> Vec<SymbolEntry> {
    table
        .iter()
        .map(|(package, name, value)| SymbolEntry {
            package: package.to_string(),
            name: name.to_string(),
            set: table.origin(package, name).unwrap_or_default().to_string(),
            kind: describe(value),
        })
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Type(token) => format!("type {}", token.name()),
        Value::Func(_) => value.type_name(),
        other => format!("const {}", other.type_name()),
    }
}

pub async fn symbols_command(args: SymbolsArgs, _config: &HotfixConfig) -> Result<()> {
    let host = DemoHost::new()?;
    let entries = list_symbols(&script_symbols(&host)?);

    if args.json {
        let json = serde_json::to_string_pretty(&entries).map_err(|e| CliError::InvalidInput(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }
    let mut current = None;
    for entry in &entries {
        if current != Some(entry.package.as_str()) {
            println!("{} {}", style(&entry.package).bold(), style(format!("({})", entry.set)).dim());
            current = Some(entry.package.as_str());
        }
        println!("  {}: {}", entry.name, entry.kind);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_layer() {
        let host = DemoHost::new().unwrap();
        let entries = list_symbols(&script_symbols(&host).unwrap());
        let find = |package: &str, name: &str| {
            entries
                .iter()
                .find(|entry| entry.package == package && entry.name == name)
                .cloned()
        };

        let join = find("std::strings", "join").unwrap();
        assert_eq!(join.set, "std");
        assert!(join.kind.starts_with("fn("), "{}", join.kind);

        assert_eq!(find("hotfix", "FuncPatch").unwrap().kind, "type hotfix::FuncPatch");
        assert_eq!(find("handler", "HttpSvc").unwrap().set, "app");
        assert_eq!(find("std::math", "PI").unwrap().kind, "const f64");
    }
}
