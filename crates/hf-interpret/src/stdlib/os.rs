use super::SYSCALL_SET;
use hf_core::{Error, Exports, IntTy, NativeFunction, Ty, Value};

const OS: &str = "syscall::os";

pub(super) fn exports() -> Exports {
    Exports::new(SYSCALL_SET)
        .with_function(
            OS,
            NativeFunction::new("pid", vec![], Ty::Int(IntTy::U32), |_| {
                Ok(Value::Int(i64::from(std::process::id())))
            }),
        )
        .with_function(
            OS,
            NativeFunction::new("getenv", vec![Ty::Str], Ty::Str, |args| {
                // unset and non-unicode variables both read as empty
                Ok(Value::string(std::env::var(args.str(0)?).unwrap_or_default()))
            }),
        )
        .with_function(
            OS,
            NativeFunction::new("args", vec![], Ty::list(Ty::Str), |_| {
                Ok(Value::list(std::env::args().map(Value::from).collect()))
            }),
        )
        .with_function(
            OS,
            NativeFunction::new("cwd", vec![], Ty::Str, |_| {
                let dir = std::env::current_dir()
                    .map_err(|err| Error::eval(format!("cannot read the working directory: {err}")))?;
                Ok(Value::string(dir.display().to_string()))
            }),
        )
}
