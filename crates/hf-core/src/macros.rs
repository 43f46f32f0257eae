/// Macro to return early with an evaluation error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::eval(format!($($arg)*)))
    };
}

/// Return early with an evaluation error unless the condition holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}
