/// Fills `{base}`, `{code}`, `{code2}` and `{code3}` in a URL template
///
/// `{code2}` and `{code3}` are the first two and three characters of the
/// code; the source shards its document directories by these prefixes.
/// The template is scanned once, so braces inside substituted values are
/// never expanded. Unknown placeholders are left untouched (configuration
/// validation rejects them up front).
pub fn render(template: &str, base: &str, code: &str) -> String {
    let prefix = |n: usize| code.chars().take(n).collect::<String>();

    let mut out = String::with_capacity(template.len() + base.len() + code.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];

        let Some(end) = after.find('}') else {
            rest = after;
            break;
        };
        match &after[1..end] {
            "base" => out.push_str(base),
            "code" => out.push_str(code),
            "code2" => out.push_str(&prefix(2)),
            "code3" => out.push_str(&prefix(3)),
            _ => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
