//! Number formatting for descriptor fields.

/// Format `value` in scientific notation with four decimals and a signed,
/// at-least-two-digit exponent: `2.0000E+03`, `-1.5000E-05`.
///
/// Non-finite values render as `NAN`, `INF` and `-INF`.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let raw = format!("{value:.4E}");
    let Some((mantissa, exponent)) = raw.split_once('E') else {
        return raw;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}E{sign}{digits:0>2}")
}
