//! Line filter applied to raw completions before they reach the caller.

/// Whether a line looks like a stray markup artifact.
///
/// Legitimate lines that happen to start with `<` or end with `>` are
/// dropped as well.
fn is_markup_artifact(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('<') || trimmed.ends_with('>')
}

/// Line boundaries recognised when splitting a completion. Besides `\n` and
/// `\r\n` this covers a lone `\r`, the vertical tab and form feed, the
/// file/group/record separators, NEL and the Unicode line/paragraph
/// separators.
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split into lines without terminators. `\r\n` counts as one boundary and a
/// trailing boundary does not produce an empty last line.
fn split_lines(raw: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = raw.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_boundary(c) {
            continue;
        }
        lines.push(&raw[start..i]);
        let mut end = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(_, '\n')) = chars.peek() {
                chars.next();
                end += 1;
            }
        }
        start = end;
    }

    if start < raw.len() {
        lines.push(&raw[start..]);
    }
    lines
}

/// Drop markup-like lines, keeping the remaining lines in order joined by `\n`.
pub fn sanitize(raw: &str) -> String {
    let mut dropped = 0usize;
    let kept: Vec<&str> = split_lines(raw)
        .into_iter()
        .filter(|line| {
            let drop = is_markup_artifact(line);
            if drop {
                dropped += 1;
            }
            !drop
        })
        .collect();

    if dropped > 0 {
        tracing::debug!(dropped_lines = dropped, kept_lines = kept.len(), "Sanitized completion");
    }

    kept.join("\n")
}
