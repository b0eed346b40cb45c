use crate::record::CompanyRecord;

/// Headline numbers shown above the table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    pub companies: usize,
    /// Billions USD.
    pub total_valuation: f64,
    pub public_companies: usize,
}

impl Statistics {
    pub fn of<'a>(records: impl IntoIterator<Item = &'a CompanyRecord>) -> Self {
        records
            .into_iter()
            .fold(Statistics::default(), |mut stats, record| {
                stats.companies += 1;
                stats.total_valuation += record.valuation;
                if record.status.trim().eq_ignore_ascii_case("public") {
                    stats.public_companies += 1;
                }
                stats
            })
    }

    pub fn total_valuation_text(&self) -> String {
        format_billions(self.total_valuation)
    }
}

/// `1500.544` -> `$1,500.54B`
pub fn format_billions(value: f64) -> String {
    let text = format!("{:.2}", value.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, chr) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(chr);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}B")
}
