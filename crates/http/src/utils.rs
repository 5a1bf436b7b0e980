//! Internal helper macros.

/// Returns early with `Err($error)` when `$predicate` does not hold.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
