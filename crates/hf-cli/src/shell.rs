//! The operator shell: one command per line, one reply per command.
//!
//! The shell is transport agnostic; [`crate::server`] feeds it lines read from TCP
//! sessions. Commands run synchronously, so callers on an async runtime should move
//! [`Shell::execute`] onto a blocking worker.

use crate::config::HotfixConfig;
use crate::demo::DemoHost;
use hf_patch::{apply_func_with, PatchLedger, PatchRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub const PROMPT: &str = "hotfix> ";

const COMMANDS: &[(&str, &str)] = &[
    ("help", "Display a list of available commands."),
    ("hotfix <script-path> <expr>", "Load a hotfix script and apply the patch `expr` evaluates to."),
    ("patches", "List live patches."),
    ("revert <id>|all", "Restore patched methods."),
    ("call <method> [path]", "Invoke a demo `HttpSvc` method."),
    ("exit", "Exit the shell."),
];

const HOTFIX_USAGE: &str = "usage: hotfix <script-path> <expr>\n  e.g. hotfix patches/patch_http.rs patch_test_handler()";
const REVERT_USAGE: &str = "usage: revert <id>|all";
const CALL_USAGE: &str = "usage: call <method> [path]";

/// What the session should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text and keep reading.
    Output(String),
    /// Nothing to print.
    Empty,
    /// Print the text and close the session.
    Exit(String),
}

/// Shared by every session; cloning is cheap.
#[derive(Clone)]
pub struct Shell {
    host: Arc<DemoHost>,
    ledger: Arc<PatchLedger>,
    config: Arc<HotfixConfig>,
}

impl Shell {
    pub fn new(host: Arc<DemoHost>, config: Arc<HotfixConfig>) -> Self {
        Self {
            host,
            ledger: Arc::new(PatchLedger::new()),
            config,
        }
    }

    pub fn ledger(&self) -> &PatchLedger {
        &self.ledger
    }

    pub fn execute(&self, line: &str) -> Reply {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "" => Reply::Empty,
            "help" => Reply::Output(help()),
            "hotfix" => Reply::Output(self.hotfix(rest)),
            "patches" => Reply::Output(self.patches()),
            "revert" => Reply::Output(self.revert(rest)),
            "call" => Reply::Output(self.call(rest)),
            "exit" | "quit" => Reply::Exit("bye".to_string()),
            other => Reply::Output(format!("unknown command `{other}`; type `help` for the list")),
        }
    }

    fn hotfix(&self, args: &str) -> String {
        let Some((script, expr)) = args.split_once(char::is_whitespace) else {
            return HOTFIX_USAGE.to_string();
        };
        let expr = expr.trim();
        info!(script, expr, "applying hotfix");
        let outcome = self
            .config
            .resolve_script(Path::new(script))
            .and_then(|path| {
                let handle = apply_func_with(&path, expr, self.host.symbols(), &self.config.apply_options())?;
                Ok(self.ledger.record(handle, path, expr)?)
            });
        match outcome {
            Ok(record) => {
                info!(id = record.id, target = %record.target, "hotfix applied");
                format!("hotfix applied (id {})", record.id)
            }
            Err(err) => {
                error!(script, expr, "hotfix failed: {err}");
                format!("hotfix error: {err}")
            }
        }
    }

    fn patches(&self) -> String {
        let records = self.ledger.list();
        if records.is_empty() {
            return "no live patches".to_string();
        }
        records.iter().map(describe).collect::<Vec<_>>().join("\n")
    }

    fn revert(&self, args: &str) -> String {
        match args {
            "" => REVERT_USAGE.to_string(),
            "all" => match self.ledger.revert_all() {
                Ok(count) => format!("reverted {count} patch(es)"),
                Err(err) => format!("revert error: {err}"),
            },
            id => {
                let Ok(id) = id.parse::<u64>() else {
                    return REVERT_USAGE.to_string();
                };
                match self.ledger.revert(id) {
                    Ok(record) => format!("reverted #{} ({})", record.id, record.target),
                    Err(err) => format!("revert error: {err}"),
                }
            }
        }
    }

    fn call(&self, args: &str) -> String {
        let mut words = args.split_whitespace();
        let Some(method) = words.next() else {
            return CALL_USAGE.to_string();
        };
        let path = words.next().unwrap_or("/");
        match self.host.call(method, path) {
            Ok(out) => out,
            Err(err) => format!("call error: {err}"),
        }
    }
}

fn help() -> String {
    let mut out = String::from("Available commands:");
    for (command, description) in COMMANDS {
        out.push_str(&format!("\n\t{command} - {description}"));
    }
    out
}

fn describe(record: &PatchRecord) -> String {
    format!(
        "#{} {} <- {} {}",
        record.id,
        record.target,
        record.script.display(),
        record.expr
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shell() -> Shell {
        Shell::new(
            Arc::new(DemoHost::new().unwrap()),
            Arc::new(HotfixConfig::default()),
        )
    }

    fn output(reply: Reply) -> String {
        match reply {
            Reply::Output(text) => text,
            other => panic!("expected output, got {other:?}"),
        }
    }

    #[test]
    fn usage_lines() {
        let shell = shell();
        assert_eq!(output(shell.execute("hotfix")), HOTFIX_USAGE);
        assert_eq!(output(shell.execute("hotfix only-a-path.rs")), HOTFIX_USAGE);
        assert_eq!(output(shell.execute("revert")), REVERT_USAGE);
        assert_eq!(output(shell.execute("revert seven")), REVERT_USAGE);
        assert_eq!(output(shell.execute("call")), CALL_USAGE);
    }

    #[test]
    fn blank_lines_and_exit() {
        let shell = shell();
        assert_eq!(shell.execute("   \r"), Reply::Empty);
        assert_eq!(shell.execute("quit"), Reply::Exit("bye".to_string()));
        assert_eq!(shell.execute("exit\r\n"), Reply::Exit("bye".to_string()));
    }

    #[test]
    fn help_lists_every_command() {
        let text = output(shell().execute("help"));
        for (command, _) in COMMANDS {
            assert!(text.contains(command), "{text}");
        }
    }
}
