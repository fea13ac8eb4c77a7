//! Small cross-cutting helpers shared by [`crate::io`] and the CLI.

/// Formats a float with at least 17 significant digits, enough to round-trip
/// through a text file without losing precision.
pub fn format_f64(x: f64) -> String {
    format!("{x:.16e}")
}
