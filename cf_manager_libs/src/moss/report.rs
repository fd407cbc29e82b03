use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static SIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<name>.*?)\s*\((?P<percent>\d+)%\)$").unwrap());

/// One row of the report table, before identities are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub first_name: String,
    pub first_percent: u32,
    pub second_name: String,
    pub second_percent: u32,
    pub lines: u32,
    pub url: String,
}

pub struct ReportScraper {
    table: Selector,
    row: Selector,
    cell: Selector,
    anchor: Selector,
}

impl ReportScraper {
    pub fn new() -> Self {
        Self {
            table: Selector::parse("table").unwrap(),
            row: Selector::parse("tr").unwrap(),
            cell: Selector::parse("td").unwrap(),
            anchor: Selector::parse("a").unwrap(),
        }
    }

    /// Reads the match table of a report page.
    ///
    /// Returns `None` when the page has no table at all; rows that do not look like
    /// matches (the header among them) are skipped.
    pub fn extract_matches(&self, html: &str) -> Option<Vec<RawMatch>> {
        let document = Html::parse_document(html);
        let table = document.select(&self.table).next()?;

        let matches = table
            .select(&self.row)
            .filter_map(|row| {
                let cells: Vec<_> = row.select(&self.cell).collect();
                if cells.len() < 3 {
                    return None;
                }

                let first = cells[0].select(&self.anchor).next()?;
                let second = cells[1].select(&self.anchor).next()?;
                let (first_name, first_percent) = split_side(&first.text().collect::<String>())?;
                let (second_name, second_percent) =
                    split_side(&second.text().collect::<String>())?;
                let lines = cells[2]
                    .text()
                    .collect::<String>()
                    .trim()
                    .parse::<u32>()
                    .ok()?;

                Some(RawMatch {
                    first_name,
                    first_percent,
                    second_name,
                    second_percent,
                    lines,
                    url: first.value().attr("href").unwrap_or_default().to_string(),
                })
            })
            .collect();

        Some(matches)
    }
}

impl Default for ReportScraper {
    fn default() -> Self {
        Self::new()
    }
}

fn split_side(text: &str) -> Option<(String, u32)> {
    let captures = SIDE.captures(text.trim())?;
    Some((
        captures.name("name")?.as_str().to_string(),
        captures.name("percent")?.as_str().parse().ok()?,
    ))
}
