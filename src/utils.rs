//! # Utility Functions Module
//!
//! Helpers for building encoder argument lists without repeated
//! `.to_string()` calls.

/// Converts a vector of string-like items to Vec<String>.
///
/// # Example
/// ```ignore
/// let args = to_string_vec(["-c:v", "prores_ks", "-profile:v", "prores_hq"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Macro for even more convenient argument building.
///
/// # Example
/// ```ignore
/// let crf = 23;
/// let args = args!["-c:v", "libx264", "-crf", crf];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}
