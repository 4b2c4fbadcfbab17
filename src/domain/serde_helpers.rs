//! Serde helpers for report fields.

use serde::Serializer;

/// Serialize an `f64`, writing infinities as the strings `"inf"` / `"-inf"`.
///
/// JSON has no literal for infinity and `serde_json` would otherwise emit
/// `null`.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize)]
/// struct Report {
///     #[serde(serialize_with = "serialize_f64_or_inf")]
///     profit_factor: f64,
/// }
/// ```
pub fn serialize_f64_or_inf<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_infinite() {
        serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
    } else if value.is_nan() {
        serializer.serialize_f64(0.0)
    } else {
        serializer.serialize_f64(*value)
    }
}
