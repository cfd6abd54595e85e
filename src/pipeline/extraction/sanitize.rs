/// Normalize page text before it is stored and pattern-matched.
///
/// Drops control characters (keeping newlines and tabs), maps non-breaking
/// spaces to plain spaces, strips trailing whitespace per line, collapses
/// runs of blank lines to one and trims the ends. Leading indentation is
/// kept because column gaps carry table structure.
pub fn normalize_page_text(raw: &str) -> String {
    let cleaned: String = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter_map(|c| match c {
            '\n' | '\t' => Some(c),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = true;
    for line in cleaned.lines().map(str::trim_end) {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push(if blank { "" } else { line });
        previous_blank = blank;
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    out.join("\n")
}
