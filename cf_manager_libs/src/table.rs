use crate::models::Standings;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// A plain string table, written as CSV or printed to the console.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.header)?;
        for row in self.rows.iter() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        write_file(path, writer.get_ref()).await?;

        tracing::info!("{} rows written to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Left aligned columns separated by two spaces.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in self.rows.iter() {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        std::iter::once(&self.header)
            .chain(self.rows.iter())
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Standings {
    /// `Who` followed by one `<index>(<name>)` column per problem.
    pub fn to_table(&self) -> Table {
        let header = std::iter::once(String::from("Who"))
            .chain(self.problems.iter().map(|problem| problem.label()))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.handle.clone())
                    .chain(row.points.iter().map(|points| points.to_string()))
                    .collect()
            })
            .collect();

        Table { header, rows }
    }
}

async fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Writes serializable records with a header row taken from their field names.
pub async fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    write_file(path, writer.get_ref()).await?;

    tracing::info!("{} records written to {}", records.len(), path.display());
    Ok(())
}
