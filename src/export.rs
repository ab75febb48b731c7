use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;

use crate::series::AlignedChart;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serialize a chart as row-per-category CSV.
///
/// Header: `"Date","<series>",...`, every field quoted. Rows: the quoted
/// category label followed by each series' value, numbers unquoted and gaps
/// as `""`. Rows are joined with `\n` without a trailing newline.
pub fn to_csv(chart: &AlignedChart) -> Result<String, ExportError> {
    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let mut names = vec!["Date".to_string()];
    names.extend(chart.series.iter().map(|s| s.name.clone()));
    header.write_record(&names)?;
    let buffer = header.into_inner().map_err(|e| e.into_error())?;

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buffer);
    for (i, category) in chart.categories.iter().enumerate() {
        let mut record = Vec::with_capacity(chart.series.len() + 1);
        record.push(category.label.clone());
        for series in &chart.series {
            record.push(
                series
                    .data
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        rows.write_record(&record)?;
    }
    let buffer = rows.into_inner().map_err(|e| e.into_error())?;

    let mut text = String::from_utf8(buffer)?;
    while text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Download name: `prefix_param1_param2_YYYY-MM-DD.csv`, whitespace in
/// params replaced by `_`
pub fn download_filename(prefix: &str, params: &[&str], today: NaiveDate) -> String {
    let mut parts = vec![prefix.to_string()];
    parts.extend(
        params
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join("_")),
    );
    parts.push(today.format("%Y-%m-%d").to_string());
    format!("{}.csv", parts.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Category, MonthDay, PALETTE, Series, SeriesKey};

    fn chart(labels: &[&str], series: Vec<(&str, Vec<Option<f64>>)>) -> AlignedChart {
        AlignedChart {
            categories: labels
                .iter()
                .enumerate()
                .map(|(i, l)| Category {
                    key: MonthDay {
                        month: 1,
                        day: i as u32 + 1,
                    },
                    label: l.to_string(),
                })
                .collect(),
            series: series
                .into_iter()
                .map(|(name, data)| Series {
                    key: SeriesKey::new("", 2025),
                    name: name.to_string(),
                    color: PALETTE[0],
                    previous_year: false,
                    data,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_series_export() {
        let chart = chart(&["Ene 1", "Ene 2"], vec![("2025", vec![Some(10.0), Some(20.0)])]);
        let csv = to_csv(&chart).unwrap();
        assert_eq!(csv, "\"Date\",\"2025\"\n\"Ene 1\",10\n\"Ene 2\",20");
    }

    #[test]
    fn test_gaps_and_fractions() {
        let chart = chart(
            &["Ene 1", "Ene 2"],
            vec![
                ("2025", vec![Some(10.5), None]),
                ("2024", vec![None, Some(8.25)]),
            ],
        );
        let csv = to_csv(&chart).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "\"Date\",\"2025\",\"2024\"");
        assert_eq!(lines[1], "\"Ene 1\",10.5,\"\"");
        assert_eq!(lines[2], "\"Ene 2\",\"\",8.25");
    }

    #[test]
    fn test_empty_chart_has_header_only() {
        let chart = chart(&[], vec![("2025", vec![]), ("2024", vec![])]);
        assert_eq!(to_csv(&chart).unwrap(), "\"Date\",\"2025\",\"2024\"");
    }

    #[test]
    fn test_download_filename() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        assert_eq!(
            download_filename("servicios_yearly", &["Reserva rodante 10 min", "mda", "SIN"], today),
            "servicios_yearly_Reserva_rodante_10_min_mda_SIN_2025-10-16.csv"
        );
        assert_eq!(
            download_filename("pnd_daily_zones", &["mda"], today),
            "pnd_daily_zones_mda_2025-10-16.csv"
        );
    }
}
