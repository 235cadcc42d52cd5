/// Canonical identity key for a raw game slug or title.
///
/// Normalization steps:
/// - lowercase
/// - collapse runs of hyphen/underscore/whitespace into a single hyphen
/// - drop every character outside `[a-z0-9-]`
/// - trim leading/trailing hyphens and collapse repeated hyphens
///
/// The function is total and idempotent; degenerate input yields an empty key.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for c in lowered.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !in_separator {
                collapsed.push('-');
                in_separator = true;
            }
        } else {
            collapsed.push(c);
            in_separator = false;
        }
    }

    // Stripping punctuation can glue separators back together ("a-!-b"), so the
    // final pass collapses hyphens on the filtered output.
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
    {
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
