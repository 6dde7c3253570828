/// Leading auxiliaries stripped from question-style titles.
const LEADING_AUXILIARIES: &[&str] = &["will", "is", "does", "has", "can"];

/// Canonicalize a market title for comparison only.
///
/// Lowercases, drops a leading interrogative auxiliary, drops a trailing `?`
/// and collapses whitespace runs. Stacked prefixes/suffixes ("will will …??")
/// are peeled until none remain, which keeps the function idempotent.
/// Every title compared by the matcher or the correlation detector goes
/// through here, on both sides.
pub fn normalize_title(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut text = lowered.trim();

    loop {
        let before = text.len();
        text = strip_auxiliary(text);
        text = text.strip_suffix('?').unwrap_or(text).trim_end();
        if text.len() == before {
            break;
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_auxiliary(text: &str) -> &str {
    for aux in LEADING_AUXILIARIES {
        if let Some(rest) = text.strip_prefix(aux) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    text
}
