use unicode_width::UnicodeWidthStr;

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Right-pad with spaces to `width` display columns. Never truncates.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    format!("{}{}", s, " ".repeat(width.saturating_sub(sw)))
}

/// Left-pad with spaces to `width` display columns. Never truncates.
pub(crate) fn pad_left(s: &str, width: usize) -> String {
    let sw = display_width(s);
    format!("{}{}", " ".repeat(width.saturating_sub(sw)), s)
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Right,
}

/// Render a boxed grid:
///
/// ```text
/// +------------+---------+
/// | Date       |   Total |
/// +============+=========+
/// | 2025-06-15 |  $10.00 |
/// +------------+---------+
/// ```
///
/// Headers follow the column's alignment. Rows shorter than `headers` are
/// padded with empty cells.
pub(crate) fn render_grid(headers: &[&str], align: &[Align], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let mut out = Vec::with_capacity(rows.len() * 2 + 3);
    out.push(rule(&widths, '-'));
    out.push(render_row(&widths, align, headers.iter().copied()));
    out.push(rule(&widths, '='));
    for row in rows {
        out.push(render_row(&widths, align, row.iter().map(String::as_str)));
        out.push(rule(&widths, '-'));
    }
    if rows.is_empty() {
        // Header-only table still closes.
        out.pop();
        out.push(rule(&widths, '-'));
    }
    out.join("\n")
}

fn rule(widths: &[usize], fill: char) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.extend(std::iter::repeat(fill).take(w + 2));
        line.push('+');
    }
    line
}

fn render_row<'a>(widths: &[usize], align: &[Align], mut cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.next().unwrap_or("");
        let padded = match align.get(i).copied().unwrap_or(Align::Left) {
            Align::Left => pad_right(cell, *w),
            Align::Right => pad_left(cell, *w),
        };
        line.push(' ');
        line.push_str(&padded);
        line.push_str(" |");
    }
    line
}
