use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Terminal style applied to a whole column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Bold,
    Green,
    Red,
    Blue,
    Yellow,
    Dimmed,
}

impl Style {
    fn paint(self, text: &str) -> String {
        match self {
            Style::Plain => text.to_string(),
            Style::Bold => text.bold().to_string(),
            Style::Green => text.green().to_string(),
            Style::Red => text.red().to_string(),
            Style::Blue => text.blue().to_string(),
            Style::Yellow => text.yellow().to_string(),
            Style::Dimmed => text.dimmed().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    header: String,
    align: Align,
    style: Style,
}

/// Box-drawn text table. Cells are padded before styling, so widths are
/// computed on the visible text only.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<(String, Option<Style>)>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, header: &str, align: Align, style: Style) -> Self {
        self.columns.push(Column {
            header: header.to_string(),
            align,
            style,
        });
        self
    }

    /// Append a row; missing trailing cells render empty.
    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells.into_iter().map(|c| (c, None)).collect());
    }

    /// Override the column style of individual cells.
    pub fn add_styled_row(&mut self, cells: Vec<(String, Option<Style>)>) {
        self.rows.push(cells);
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|(text, _)| text.chars().count())
                    .chain(std::iter::once(column.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let rule = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{left}{}{right}\n", segments.join(mid))
        };

        let mut out = rule("╭", "┬", "╮");

        let headers: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(column, &width)| {
                let padded = pad(&column.header, width, column.align);
                padded.cyan().bold().to_string()
            })
            .collect();
        out.push_str(&format!("│ {} │\n", headers.join(" │ ")));
        out.push_str(&rule("├", "┼", "┤"));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (column, &width))| {
                    let (text, style) = row
                        .get(i)
                        .map(|(text, style)| (text.as_str(), *style))
                        .unwrap_or(("", None));
                    style.unwrap_or(column.style).paint(&pad(text, width, column.align))
                })
                .collect();
            out.push_str(&format!("│ {} │\n", cells.join(" │ ")));
        }

        out.push_str(&rule("╰", "┴", "╯"));
        out
    }
}

fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    match align {
        Align::Left => format!("{text}{fill}"),
        Align::Right => format!("{fill}{text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_aligns_columns() {
        plain();
        let mut table = Table::new()
            .column("Name", Align::Left, Style::Bold)
            .column("Count", Align::Right, Style::Green);
        table.add_row(vec!["alice".to_string(), "7".to_string()]);
        table.add_row(vec!["bo".to_string(), "1,024".to_string()]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "╭───────┬───────╮");
        assert_eq!(lines[1], "│ Name  │ Count │");
        assert_eq!(lines[2], "├───────┼───────┤");
        assert_eq!(lines[3], "│ alice │     7 │");
        assert_eq!(lines[4], "│ bo    │ 1,024 │");
        assert_eq!(lines[5], "╰───────┴───────╯");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_short_rows_render_empty_cells() {
        plain();
        let mut table = Table::new()
            .column("A", Align::Left, Style::Plain)
            .column("B", Align::Left, Style::Plain);
        table.add_row(vec!["x".to_string()]);
        assert!(table.render().contains("│ x │   │"));
    }

    #[test]
    fn test_width_counts_chars_not_bytes() {
        plain();
        let mut table = Table::new().column("User", Align::Left, Style::Plain);
        table.add_row(vec!["zoë".to_string()]);
        assert!(table.render().contains("│ zoë  │"));
    }
}
