// src/present.rs
//! Plain-text digest. Marked authors are wrapped in `*…*`, marked title
//! characters in `[…]`.

use crate::entry::Entry;

const LINE_WIDTH: usize = 90;
const INDENT: &str = "     ";

pub fn render_entries(entries: &[Entry]) -> String {
    entries.iter().map(render_entry).collect()
}

pub fn render_entry(entry: &Entry) -> String {
    let mut lines = vec![
        format!("({:2}) {}", entry.rating, entry.abs_url()),
        format!("{INDENT}{}", author_line(entry)),
    ];
    lines.extend(title_lines(entry).into_iter().map(|l| format!("{INDENT}{l}")));
    lines.push(format!(
        "{INDENT}submitted {} on {}",
        entry.date_submitted.format("%Y-%m-%d %H:%M:%S %Z"),
        entry.category
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Authors in listing order, cut off with `...` once the names would pass
/// the line width.
fn author_line(entry: &Entry) -> String {
    let mut parts = Vec::new();
    let mut used = 0usize;
    for (i, name) in entry.authors.iter().enumerate() {
        let len = name.chars().count();
        if used + len > LINE_WIDTH {
            parts.push("...".to_string());
            break;
        }
        used += len;
        if entry.author_marks.get(i).copied().unwrap_or(false) {
            parts.push(format!("*{name}*"));
        } else {
            parts.push(name.clone());
        }
    }
    parts.join(", ")
}

/// Title wrapped at the first space past the line width, with every run of
/// marked characters bracketed. Runs never span a line break.
fn title_lines(entry: &Entry) -> Vec<String> {
    let mut lines: Vec<Vec<(char, bool)>> = vec![vec![]];
    let mut width = 0usize;
    for (i, c) in entry.title.chars().enumerate() {
        if c == ' ' && width > LINE_WIDTH {
            width = 0;
            lines.push(vec![]);
            continue;
        }
        width += 1;
        if let Some(line) = lines.last_mut() {
            line.push((c, entry.title_marks.contains(&i)));
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let mut s = String::new();
            let mut open = false;
            for (c, marked) in line {
                if marked != open {
                    s.push(if marked { '[' } else { ']' });
                    open = marked;
                }
                s.push(c);
            }
            if open {
                s.push(']');
            }
            s
        })
        .collect()
}
