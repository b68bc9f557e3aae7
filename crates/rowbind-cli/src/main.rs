//! rowbind CLI - inspect .xls workbooks and dump sheets as CSV

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use rowbind::{RowMapper, TextRows, XlsReader};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowbind")]
#[command(author, version, about = "Inspect legacy Excel (.xls) workbooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a sheet as CSV to stdout or a file
    #[command(alias = "csv")]
    ToCsv {
        /// Input workbook (.xls)
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sheet index to dump (0-based)
        #[arg(short, long, default_value = "0")]
        sheet: usize,

        /// Leave out the first stored row
        #[arg(long)]
        skip_header: bool,

        /// Field delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Show information about a workbook
    Info {
        /// Input workbook (.xls)
        input: PathBuf,
    },

    /// List all sheets in a workbook
    Sheets {
        /// Input workbook (.xls)
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ToCsv {
            input,
            output,
            sheet,
            skip_header,
            delimiter,
        } => to_csv(&input, output.as_deref(), sheet, skip_header, delimiter),
        Commands::Info { input } => show_info(&input),
        Commands::Sheets { input } => list_sheets(&input),
    }
}

fn to_csv(
    input: &Path,
    output: Option<&Path>,
    sheet: usize,
    skip_header: bool,
    delimiter: char,
) -> Result<()> {
    ensure!(
        delimiter.is_ascii(),
        "Delimiter must be a single ASCII character, got '{delimiter}'"
    );

    let rows = RowMapper::new(input)
        .read_rows(sheet, skip_header)
        .with_context(|| format!("Failed to read sheet {} of '{}'", sheet, input.display()))?;
    if rows.is_empty() {
        tracing::warn!("Sheet {} of '{}' has no rows", sheet, input.display());
    }

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            write_csv(&rows, file, delimiter as u8)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            tracing::info!("Wrote {} rows to '{}'", rows.len(), path.display());
        }
        None => write_csv(&rows, io::stdout().lock(), delimiter as u8)
            .context("Failed to write to stdout")?,
    }
    Ok(())
}

/// Absent cells become empty fields
fn write_csv<W: Write>(rows: &TextRows, writer: W, delimiter: u8) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    for (_, cells) in rows {
        csv_writer.write_record(cells.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let workbook = XlsReader::read_file(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    println!("File: {}", input.display());
    println!("Sheets: {}", workbook.sheet_count());
    println!(
        "Date system: {}",
        if workbook.settings().date_1904 {
            "1904"
        } else {
            "1900"
        }
    );

    for (i, sheet) in workbook.worksheets().enumerate() {
        println!();
        print!("  Sheet {}: \"{}\"", i, sheet.name());
        if !sheet.is_visible() {
            print!(" (hidden)");
        }
        println!();

        match sheet.used_range() {
            Some(range) => println!(
                "    Used range: {} ({} rows x {} columns)",
                range,
                range.row_count(),
                range.col_count()
            ),
            None => println!("    Used range: empty"),
        }
        println!("    Cells: {}", sheet.cell_count());
        if !sheet.merged_regions().is_empty() {
            println!("    Merged regions: {}", sheet.merged_regions().len());
        }
    }

    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let names = RowMapper::new(input)
        .sheet_names()
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    for (i, name) in names.iter().enumerate() {
        println!("{}\t{}", i, name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_and_gaps() {
        let rows: TextRows = vec![
            (0, vec![Some("Name".into()), Some("Note".into())]),
            (1, vec![Some("Li".into()), Some("a, \"b\"".into())]),
            (4, vec![None, Some("x".into())]),
        ];
        let mut out = Vec::new();
        write_csv(&rows, &mut out, b',').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name,Note\nLi,\"a, \"\"b\"\"\"\n,x\n"
        );
    }

    #[test]
    fn test_to_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xls");
        let output = dir.path().join("out.csv");

        let mut workbook = rowbind::Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value_at(0, 0, "Name").unwrap();
        sheet.set_cell_value_at(1, 0, "Li").unwrap();
        sheet.set_cell_value_at(1, 1, 3.5).unwrap();
        rowbind::XlsWriter::write_file(&workbook, &input).unwrap();

        to_csv(&input, Some(&output), 0, true, ';').unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Li;3.5\n");
    }

    #[test]
    fn test_rejects_wide_delimiter() {
        let err = to_csv(Path::new("unused.xls"), None, 0, false, '→').unwrap_err();
        assert!(err.to_string().contains("ASCII"));
    }
}
