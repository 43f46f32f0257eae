//! Base symbol sets.
//!
//! Every interpreter composes these sets first, in this order, before the sets supplied
//! by the caller:
//!
//! | set            | packages                                                |
//! |----------------|---------------------------------------------------------|
//! | `std`          | `std::strings`, `std::math`, `std::time`, `std::log`    |
//! | `unsafe`       | `unsafe::mem`                                           |
//! | `syscall`      | `syscall::os`                                           |
//! | `unrestricted` | `unrestricted::reflect`                                 |

mod base;
mod mem;
mod os;
mod reflect;

use hf_core::{Error, Exports, Result, SymbolTable};
use once_cell::sync::Lazy;

pub const STD_SET: &str = "std";
pub const UNSAFE_SET: &str = "unsafe";
pub const SYSCALL_SET: &str = "syscall";
pub const UNRESTRICTED_SET: &str = "unrestricted";

static BASE_SYMBOLS: Lazy<Result<SymbolTable>> = Lazy::new(|| SymbolTable::compose(&base_sets()));

/// The base sets, in registration order.
pub fn base_sets() -> Vec<Exports> {
    vec![base::exports(), mem::exports(), os::exports(), reflect::exports()]
}

/// The composed base sets. Built once per process and shared.
pub fn base_symbols() -> Result<SymbolTable> {
    match &*BASE_SYMBOLS {
        Ok(table) => Ok(table.clone()),
        Err(err) => Err(Error::SymbolRegistry(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sets_register_in_order() {
        let table = base_symbols().unwrap();
        assert_eq!(table.sets(), [STD_SET, UNSAFE_SET, SYSCALL_SET, UNRESTRICTED_SET]);
        assert_eq!(table.origin("std::strings", "join"), Some(STD_SET));
        assert_eq!(table.origin("unsafe::mem", "addr_of"), Some(UNSAFE_SET));
        assert_eq!(table.origin("syscall::os", "pid"), Some(SYSCALL_SET));
        assert_eq!(table.origin("unrestricted::reflect", "type_of"), Some(UNRESTRICTED_SET));
    }
}
