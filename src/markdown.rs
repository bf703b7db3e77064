use std::sync::LazyLock;

use regex::Regex;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.*?)`").unwrap());

/// Convert the chat markdown subset to HTML.
///
/// Bold must run before italic, otherwise the single-asterisk pattern
/// would consume half of each `**` pair.
pub fn to_html(content: &str) -> String {
    let html = BOLD.replace_all(content, "<strong>$1</strong>");
    let html = ITALIC.replace_all(&html, "<em>$1</em>");
    let html = CODE.replace_all(&html, "<code>$1</code>");
    html.replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_all_supported_markup() {
        assert_eq!(
            to_html("**a** *b* `c`\nd"),
            "<strong>a</strong> <em>b</em> <code>c</code><br />d"
        );
    }

    #[test]
    fn conversion_is_idempotent_on_output() {
        let once = to_html("**CBA** waives *LMI* for `doctors`\nat 90% LVR");
        assert_eq!(to_html(&once), once);
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(to_html("No markup here"), "No markup here");
        assert_eq!(to_html(""), "");
    }

    #[test]
    fn unmatched_markers_are_left_alone() {
        assert_eq!(to_html("5 * 3 = 15"), "5 * 3 = 15");
        assert_eq!(to_html("a `b"), "a `b");
    }

    #[test]
    fn markup_does_not_span_lines() {
        assert_eq!(to_html("*a\nb*"), "*a<br />b*");
    }

    #[test]
    fn bold_applied_before_italic() {
        assert_eq!(to_html("**x**"), "<strong>x</strong>");
        assert_eq!(to_html("***x***"), "<strong><em>x</strong></em>");
    }
}
