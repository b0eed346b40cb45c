use crate::engine::{HeaderCell, RenderedTable};
use crate::stats::Statistics;

const COLUMN_SEPARATOR: &str = "  ";

pub fn sort_marker(header: &HeaderCell) -> &'static str {
    match header.sorted {
        Some(false) => " ▲",
        Some(true) => " ▼",
        None => "",
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = width.saturating_sub(text.chars().count());
    if right_align {
        format!("{}{}", " ".repeat(fill), text)
    } else {
        format!("{}{}", text, " ".repeat(fill))
    }
}

/// Plain text rendering of one page, for `--print` and logs.
pub fn render_text(table: &RenderedTable, stats: Option<&Statistics>, max_column_width: usize) -> String {
    let labels: Vec<String> = table
        .headers
        .iter()
        .map(|h| format!("{}{}", h.label, sort_marker(h)))
        .collect();

    let widths: Vec<usize> = labels
        .iter()
        .enumerate()
        .map(|(cidx, label)| {
            table
                .rows
                .iter()
                .filter_map(|r| r.cells.get(cidx))
                .map(|c| c.text.chars().count())
                .chain(std::iter::once(label.chars().count()))
                .max()
                .unwrap_or(0)
                .min(max_column_width.max(1))
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    if let Some(stats) = stats {
        lines.push(format!(
            "{} companies · {} total valuation · {} public",
            stats.companies,
            stats.total_valuation_text(),
            stats.public_companies
        ));
    }

    let filters: Vec<String> = table
        .headers
        .iter()
        .filter_map(|h| h.filter.as_ref().map(|f| format!("{}={f}", h.id)))
        .collect();
    if !filters.is_empty() {
        lines.push(format!("filters: {}", filters.join(", ")));
    }

    let header_line: Vec<String> = labels
        .iter()
        .zip(table.headers.iter())
        .zip(widths.iter())
        .map(|((label, header), &width)| pad(&fit(label, width), width, header.numeric))
        .collect();
    lines.push(header_line.join(COLUMN_SEPARATOR).trim_end().to_string());

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    lines.push(rule.join(COLUMN_SEPARATOR));

    for row in table.rows.iter() {
        let line: Vec<String> = row
            .cells
            .iter()
            .zip(table.headers.iter())
            .zip(widths.iter())
            .map(|((cell, header), &width)| pad(&fit(&cell.text, width), width, header.numeric))
            .collect();
        lines.push(line.join(COLUMN_SEPARATOR).trim_end().to_string());
    }

    lines.push(format!(
        "Page {} of {} · {} of {} companies",
        table.page + 1,
        table.total_pages,
        table.matched,
        table.total
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_truncates_with_ellipsis() {
        assert_eq!(fit("Valuation", 20), "Valuation");
        assert_eq!(fit("Valuation", 5), "Valu…");
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn pad_aligns() {
        assert_eq!(pad("5", 3, true), "  5");
        assert_eq!(pad("ab", 3, false), "ab ");
        assert_eq!(pad("abcd", 3, false), "abcd");
    }

    #[test]
    fn page_text_layout() {
        use crate::column::Schema;
        use crate::engine::{TableOptions, TableView};
        use crate::record::{Company, CompanyRecord, Dataset};

        let record = |name: &str, valuation: f64| CompanyRecord {
            company: Company {
                name: name.into(),
                link: String::new(),
            },
            valuation,
            founder: "F".into(),
            industry: "Fintech".into(),
            founded: 2001,
            status: "Private".into(),
        };
        let dataset = Dataset::new("t", vec![record("Beta", 12.5), record("Acme", 5.0)]).unwrap();
        let table = TableView::new(dataset, Schema::companies(), TableOptions::default()).unwrap();

        let text = render_text(&table.render(), None, 32);
        assert!(text.ends_with("companies\n"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Company"));
        assert!(lines[1].starts_with("-------"));
        assert!(lines[2].starts_with("Acme"));
        assert!(lines[3].starts_with("Beta"));
        assert_eq!(lines[4], "Page 1 of 1 · 2 of 2 companies");
    }
}
