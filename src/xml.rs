//! XML assembly helpers for the Gmail filter feed.
//!
//! The feed format is small and fixed, so it is written by hand with escaped
//! string assembly rather than through an XML library.

/// Escapes the five XML special characters in text and attribute values.
pub(crate) fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Writes `<name>text</name>` on its own line.
pub(crate) fn text_element(output: &mut String, indent: &str, name: &str, text: &str) {
    output.push_str(indent);
    output.push('<');
    output.push_str(name);
    output.push('>');
    output.push_str(&escape(text));
    output.push_str("</");
    output.push_str(name);
    output.push_str(">\n");
}

/// Writes a Gmail `<apps:property name='..' value='..'/>` leaf.
pub(crate) fn apps_property(output: &mut String, indent: &str, name: &str, value: &str) {
    output.push_str(indent);
    output.push_str("<apps:property name='");
    output.push_str(&escape(name));
    output.push_str("' value='");
    output.push_str(&escape(value));
    output.push_str("'/>\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_all_special_characters() {
        assert_eq!(escape("a&b"), "a&amp;b");
        assert_eq!(escape("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape("\"q\""), "&quot;q&quot;");
        assert_eq!(escape("it's"), "it&apos;s");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn text_element_escapes_content() {
        let mut out = String::new();
        text_element(&mut out, "  ", "title", "Spam & Ham");
        assert_eq!(out, "  <title>Spam &amp; Ham</title>\n");
    }

    #[test]
    fn apps_property_escapes_value() {
        let mut out = String::new();
        apps_property(&mut out, "", "hasTheWord", "from:(a@b.com) \"x<y\"");
        assert_eq!(
            out,
            "<apps:property name='hasTheWord' value='from:(a@b.com) &quot;x&lt;y&quot;'/>\n"
        );
    }
}
