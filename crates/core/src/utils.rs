//! Internal helper macros shared by the reactor modules.

/// Returns early with `Err($error)` when `$predicate` does not hold.
///
/// Works like `assert!`, but produces an error value instead of panicking:
///
/// ```ignore
/// ensure!(len <= max, BufferError::capacity_exceeded(len, max));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
