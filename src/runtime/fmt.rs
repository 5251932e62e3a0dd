//! f-string rendering: format specs applied to evaluated values.

use crate::frontend::ast::{FormatSpec, Span};
use crate::frontend::diagnostics::Code;

use super::interp::SpyError;
use super::value::Value;

/// Render a value with an optional format spec.
///
/// - bare: `str()`-style rendering
/// - `.Nf`: fixed-point with N fractional digits
/// - `.N%`: value times 100 with N fractional digits and a `%` sign
pub fn format_with_spec(
    value: &Value<'_>,
    spec: Option<FormatSpec>,
    span: Span,
) -> Result<String, SpyError> {
    match spec {
        None => Ok(value.to_string()),
        Some(FormatSpec::Fixed(precision)) => {
            let number = numeric(value, "f", span)?;
            Ok(format!("{:.*}", precision, number))
        }
        Some(FormatSpec::Percent(precision)) => {
            let number = numeric(value, "%", span)?;
            Ok(format!("{:.*}%", precision, number * 100.0))
        }
    }
}

fn numeric(value: &Value<'_>, spec_kind: &str, span: Span) -> Result<f64, SpyError> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v),
        other => Err(SpyError {
            code: Code::TypeError,
            message: format!(
                "format spec '{}' requires a number, not '{}'",
                spec_kind,
                other.type_name()
            ),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_spec() {
        let rendered = format_with_spec(&Value::Float(78.53981633974483), Some(FormatSpec::Fixed(2)), Span::default());
        assert_eq!(rendered.unwrap(), "78.54");
    }

    #[test]
    fn test_fixed_spec_on_int() {
        let rendered = format_with_spec(&Value::Int(3), Some(FormatSpec::Fixed(2)), Span::default());
        assert_eq!(rendered.unwrap(), "3.00");
    }

    #[test]
    fn test_percent_spec() {
        let rendered = format_with_spec(&Value::Float(0.257), Some(FormatSpec::Percent(1)), Span::default());
        assert_eq!(rendered.unwrap(), "25.7%");
    }

    #[test]
    fn test_bare_spec() {
        let rendered = format_with_spec(&Value::str("hi"), None, Span::default());
        assert_eq!(rendered.unwrap(), "hi");
    }

    #[test]
    fn test_spec_rejects_strings() {
        let err = format_with_spec(&Value::str("hi"), Some(FormatSpec::Fixed(2)), Span::default());
        assert_eq!(err.unwrap_err().code, Code::TypeError);
    }
}
