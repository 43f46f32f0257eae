//! Live method hotfixes.
//!
//! [`apply_func`] loads a patch script, evaluates an expression that yields a
//! `hotfix::FuncPatch`, finds the targeted method slot and redirects it to the
//! replacement. The returned [`PatchHandle`](hf_core::PatchHandle) restores the original.

pub mod apply;
pub mod descriptor;
pub mod ledger;
pub mod resolve;

pub use apply::{apply_func, apply_func_with, check_func, check_func_with, ApplyOptions, PatchPlan};
pub use descriptor::{extract, hotfix_exports, hotfix_symbols, PatchDescriptor, HOTFIX_SET};
pub use ledger::{PatchLedger, PatchRecord};
pub use resolve::resolve;
