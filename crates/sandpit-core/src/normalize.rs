//! Reduce a diagnostic trace to a single error line

use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when no `SomethingError: message` line can be found
pub const UNKNOWN_ERROR: &str = "Unknown Error";

// `.` does not cross newlines, so the message stops at the end of its line.
static ERROR_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*Error:.*").expect("valid error line regex")
});

/// Extract the last `<Name>Error: <message>` occurrence from `stderr`.
///
/// Stack frames and source excerpts are discarded; only the innermost
/// classification and its message survive.
#[must_use]
pub fn normalize(stderr: &str) -> String {
    ERROR_LINE_RE
        .find_iter(stderr)
        .last()
        .map_or_else(|| UNKNOWN_ERROR.to_string(), |m| m.as_str().trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input() {
        assert_eq!(normalize(""), UNKNOWN_ERROR);
        assert_eq!(normalize("   "), UNKNOWN_ERROR);
        assert_eq!(normalize("\n\t\n"), UNKNOWN_ERROR);
    }

    #[test]
    fn test_no_pattern() {
        assert_eq!(normalize("no error pattern here"), UNKNOWN_ERROR);
        assert_eq!(normalize("This is not an error message"), UNKNOWN_ERROR);
    }

    #[test]
    fn test_inline_error() {
        assert_eq!(
            normalize("Something went wrong - ValueError: invalid literal for int()"),
            "ValueError: invalid literal for int()"
        );
        assert_eq!(
            normalize("some random words: SyntaxError: unexpected EOF while parsing"),
            "SyntaxError: unexpected EOF while parsing"
        );
    }

    #[test]
    fn test_traceback_keeps_last_line() {
        let trace = "Traceback (most recent call last):\r\n  \
                     File \"/tmp/sandpit/abc.py\", line 1, in <module>\r\n    \
                     undefined_name()\r\n\
                     NameError: name 'undefined_name' is not defined\r\n";
        assert_eq!(
            normalize(trace),
            "NameError: name 'undefined_name' is not defined"
        );
    }

    #[test]
    fn test_chained_exceptions_use_innermost() {
        let trace = "KeyError: 'a'\n\nDuring handling of the above exception, \
                     another exception occurred:\n\nRuntimeError: wrapped";
        assert_eq!(normalize(trace), "RuntimeError: wrapped");
    }

    #[test]
    fn test_match_is_returned_verbatim() {
        assert_eq!(normalize("NameError:foo"), "NameError:foo");
        assert_eq!(normalize("ValueError:\n"), "ValueError:");
        assert_eq!(normalize("KeyError:  'a'  \r\n"), "KeyError:  'a'");
    }

    #[test]
    fn test_dotted_name_keeps_final_component() {
        assert_eq!(normalize("mypkg.CustomError: boom"), "CustomError: boom");
    }
}
