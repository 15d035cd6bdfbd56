//! Text encoder and span locator for the tfvars artifact.
//!
//! Decoding goes through `hcl-rs`; this module only renders new entries and
//! uses the spans `hcl-edit` records to find where an object-valued
//! top-level attribute opens and closes, so that an entry can be spliced in
//! without touching any other byte.

use crate::resource::{ResourceId, VpcAttributes};
use hcl_edit::Span;
use hcl_edit::expr::Expression;
use hcl_edit::parser::parse_body;

/// Byte offsets of the object value of a top-level `name = { ... }` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    /// The opening `{`
    pub open: usize,
    /// The matching closing `}`
    pub close: usize,
}

/// Escape special characters in HCL quoted strings
pub fn escape_hcl_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace("${", "$${")
        .replace("%{", "%%{")
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_hcl_string(s))
}

/// Render one entry of the imported config set, indented for a top-level
/// object and terminated by a newline.
pub fn render_entry(id: &ResourceId, attributes: &VpcAttributes) -> String {
    let mut hcl = String::new();
    hcl.push_str(&format!("  {} = {{\n", quoted(id.as_str())));
    hcl.push_str(&format!(
        "    cidr_block           = {}\n",
        quoted(&attributes.cidr_block)
    ));
    hcl.push_str("    enable_dns_support   = true\n");
    hcl.push_str("    enable_dns_hostnames = true\n");

    if attributes.tags.is_empty() {
        hcl.push_str("    tags                 = {}\n");
    } else {
        hcl.push_str("    tags = {\n");
        for (key, value) in &attributes.tags {
            hcl.push_str(&format!("      {} = {}\n", quoted(key), quoted(value)));
        }
        hcl.push_str("    }\n");
    }

    hcl.push_str("  }\n");
    hcl
}

/// Render a complete `name = { <entry> }` attribute
pub fn render_section(name: &str, id: &ResourceId, attributes: &VpcAttributes) -> String {
    format!("{} = {{\n{}}}\n", name, render_entry(id, attributes))
}

/// Return `text` with `entry` inserted as the last element of the object at
/// `span`. Bytes outside the insertion point are preserved.
pub fn insert_entry(text: &str, span: ObjectSpan, entry: &str) -> String {
    let before_close = &text[..span.close];
    let line_start = before_close.rfind('\n').map(|i| i + 1);

    let mut result = String::with_capacity(text.len() + entry.len() + 1);

    match line_start {
        // Closing brace sits on its own line: the entry goes right above it
        Some(line_start)
            if line_start > span.open && before_close[line_start..].trim().is_empty() =>
        {
            result.push_str(&text[..line_start]);
            result.push_str(entry);
            result.push_str(&text[line_start..]);
        }
        _ => {
            result.push_str(before_close);
            result.push('\n');
            result.push_str(entry);
            result.push_str(&text[span.close..]);
        }
    }

    result
}

/// Append a rendered section at the end of `text`, separated by a blank line
pub fn append_block(text: &str, block: &str) -> String {
    let mut result = text.to_string();

    if !result.is_empty() {
        if !result.ends_with('\n') {
            result.push('\n');
        }
        result.push('\n');
    }

    result.push_str(block);
    result
}

/// Find every top-level attribute called `name` whose value is an object
/// literal.
///
/// The text is parsed with `hcl-edit`, which keeps byte spans for every
/// expression. An attribute with that name whose value is not an object
/// literal is an error, as is text that does not parse.
pub fn find_top_level_objects(text: &str, name: &str) -> Result<Vec<ObjectSpan>, String> {
    let body = parse_body(text).map_err(|err| err.to_string())?;
    let bytes = text.as_bytes();

    let mut spans = Vec::new();
    for attribute in body.iter().filter_map(|structure| structure.as_attribute()) {
        if attribute.key.as_str() != name {
            continue;
        }

        let object = match &attribute.value {
            Expression::Object(object) => object,
            _ => return Err(format!("'{}' is not an object literal", name)),
        };

        let range = object
            .span()
            .ok_or_else(|| format!("no source location for '{}'", name))?;

        if range.is_empty()
            || bytes.get(range.start) != Some(&b'{')
            || bytes.get(range.end - 1) != Some(&b'}')
        {
            return Err(format!("could not locate the braces of '{}'", name));
        }

        spans.push(ObjectSpan {
            open: range.start,
            close: range.end - 1,
        });
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "imported_vpc_configs";

    fn id(raw: &str) -> ResourceId {
        ResourceId::new(raw).unwrap()
    }

    #[test]
    fn test_escape_hcl_string() {
        assert_eq!(escape_hcl_string(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_hcl_string("a\\b"), "a\\\\b");
        assert_eq!(escape_hcl_string("${var}"), "$${var}");
        assert_eq!(escape_hcl_string("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn test_render_entry_layout() {
        let attrs = VpcAttributes::new("10.0.0.0/16").with_tag("Name", "A");
        let rendered = render_entry(&id("vpc-1"), &attrs);

        assert_eq!(
            rendered,
            concat!(
                "  \"vpc-1\" = {\n",
                "    cidr_block           = \"10.0.0.0/16\"\n",
                "    enable_dns_support   = true\n",
                "    enable_dns_hostnames = true\n",
                "    tags = {\n",
                "      \"Name\" = \"A\"\n",
                "    }\n",
                "  }\n",
            )
        );
    }

    #[test]
    fn test_render_entry_without_tags() {
        let rendered = render_entry(&id("vpc-1"), &VpcAttributes::new("10.1.0.0/16"));
        assert!(rendered.contains("tags                 = {}"));
    }

    #[test]
    fn test_find_section_span() {
        let text = "a = 1\nimported_vpc_configs = {\n  \"x\" = {}\n}\nb = 2\n";
        let spans = find_top_level_objects(text, SECTION).unwrap();

        assert_eq!(spans.len(), 1);
        assert_eq!(&text[..spans[0].open], "a = 1\nimported_vpc_configs = ");
        assert_eq!(&text[spans[0].close..], "}\nb = 2\n");
    }

    #[test]
    fn test_find_ignores_comments_strings_and_nested_keys() {
        let text = r#"
# imported_vpc_configs = {
// imported_vpc_configs = {
/* imported_vpc_configs = { */
note = "imported_vpc_configs = { }"
other = {
  imported_vpc_configs = {}
}
"#;
        assert!(find_top_level_objects(text, SECTION).unwrap().is_empty());
    }

    #[test]
    fn test_find_ignores_braces_inside_strings() {
        let text = "imported_vpc_configs = {\n  \"a\" = { tags = { \"k\" = \"}{\" } }\n}\n";
        let spans = find_top_level_objects(text, SECTION).unwrap();

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].close, text.len() - 2);
    }

    #[test]
    fn test_find_skips_heredoc() {
        let text = "doc = <<EOT\n}\nimported_vpc_configs = {\nEOT\nimported_vpc_configs = {}\n";
        let spans = find_top_level_objects(text, SECTION).unwrap();

        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].open..], "{}\n");
        assert!(text[..spans[0].open].ends_with("EOT\nimported_vpc_configs = "));
    }

    #[test]
    fn test_find_reports_duplicates() {
        let text = "imported_vpc_configs = {}\nimported_vpc_configs = {}\n";
        assert_eq!(find_top_level_objects(text, SECTION).unwrap().len(), 2);
    }

    #[test]
    fn test_find_rejects_non_object_value() {
        let text = "imported_vpc_configs = var.other\n";
        assert!(find_top_level_objects(text, SECTION).is_err());
    }

    #[test]
    fn test_find_rejects_unbalanced() {
        assert!(find_top_level_objects("imported_vpc_configs = {\n", SECTION).is_err());
        assert!(find_top_level_objects("a = }\n", SECTION).is_err());
    }

    #[test]
    fn test_insert_entry_above_closing_line() {
        let text = "imported_vpc_configs = {\n  \"a\" = {}\n}\n";
        let span = find_top_level_objects(text, SECTION).unwrap()[0];

        let merged = insert_entry(text, span, "  \"b\" = {}\n");

        assert_eq!(merged, "imported_vpc_configs = {\n  \"a\" = {}\n  \"b\" = {}\n}\n");
    }

    #[test]
    fn test_insert_entry_into_inline_object() {
        let text = "imported_vpc_configs = {}\n";
        let span = find_top_level_objects(text, SECTION).unwrap()[0];

        let merged = insert_entry(text, span, "  \"b\" = {}\n");

        assert_eq!(merged, "imported_vpc_configs = {\n  \"b\" = {}\n}\n");
    }

    #[test]
    fn test_append_block_separates_with_blank_line() {
        assert_eq!(append_block("a = 1", "b = 2\n"), "a = 1\n\nb = 2\n");
        assert_eq!(append_block("a = 1\n", "b = 2\n"), "a = 1\n\nb = 2\n");
        assert_eq!(append_block("", "b = 2\n"), "b = 2\n");
    }
}
