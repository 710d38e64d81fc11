//! Locating the real CSV header below free-form metadata lines.

/// The tabular part of an uploaded file: the header line, its non-blank
/// data lines and the size of the trailing footer that was cut off.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock<'a> {
    /// Zero-based line number of the header in the decoded text.
    pub header_line: usize,
    pub header: &'a str,
    pub rows: Vec<&'a str>,
    /// Trailing lines without a delimiter, dropped as a footer.
    pub footer_lines: usize,
}

impl DataBlock<'_> {
    /// Rebuilds the block as CSV text for the record reader.
    pub fn to_csv_text(&self) -> String {
        let mut text = String::with_capacity(
            self.header.len() + self.rows.iter().map(|r| r.len() + 1).sum::<usize>() + 1,
        );
        text.push_str(self.header);
        for row in &self.rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }
}

/// Finds the first non-comment line mentioning both column markers.
///
/// Lines before the header are metadata and are discarded. Every non-blank
/// line after it is a data row, except a trailing run of lines that do not
/// contain `delimiter`: those form the export footer. Returns `None` when no
/// line qualifies as a header.
pub fn find_data_block<'a>(
    text: &'a str,
    time_marker: &str,
    production_marker: &str,
    comment_prefix: &str,
    delimiter: char,
) -> Option<DataBlock<'a>> {
    let mut lines = text.lines().enumerate();
    let (header_line, header) = lines.by_ref().find(|(_, line)| {
        let is_comment = !comment_prefix.is_empty() && line.trim_start().starts_with(comment_prefix);
        !is_comment && line.contains(time_marker) && line.contains(production_marker)
    })?;

    let mut rows: Vec<&str> = lines
        .map(|(_, line)| line)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let data_end = rows
        .iter()
        .rposition(|line| line.contains(delimiter))
        .map_or(0, |last| last + 1);
    let footer_lines = rows.len() - data_end;
    rows.truncate(data_end);

    Some(DataBlock {
        header_line,
        header: header.trim(),
        rows,
        footer_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PV_EXPORT: &str = "Latitude (decimal degrees):\t41.892\n\
Longitude (decimal degrees):\t12.511\n\
# time;P_Wh is documented below\n\
Radiation database:\tPVGIS-SARAH2\n\
time;P_Wh;G(i);H_sun;T2m;WS10m\n\
2020-01-01T00:00:00;0.0;0.0;0.0;8.1;1.2\n\
2020-01-01T01:00:00;0.0;0.0;0.0;7.9;1.1\n\
\n\
P_Wh: PV system power (W)\n\
G(i): Global irradiance on the inclined plane (W/m2)\n";

    #[test]
    fn skips_metadata_and_comment_lines() {
        let block = find_data_block(PV_EXPORT, "time", "P_Wh", "#", ';');
        let block = block.as_ref();
        assert_eq!(block.map(|b| b.header_line), Some(4));
        assert_eq!(block.map(|b| b.header), Some("time;P_Wh;G(i);H_sun;T2m;WS10m"));
    }

    #[test]
    fn footer_without_delimiter_is_cut() {
        let block = find_data_block(PV_EXPORT, "time", "P_Wh", "#", ';');
        assert_eq!(block.as_ref().map(|b| b.rows.len()), Some(2));
        assert_eq!(block.map(|b| b.footer_lines), Some(2));
    }

    #[test]
    fn blank_lines_inside_data_are_skipped() {
        let text = "time;P_Wh\n\
2020-01-01T00:00:00;1\n\
2020-01-01T01:00:00;2\n\
\n\
\r\r\n\
2020-01-01T02:00:00;3\n\
2020-01-01T03:00:00;4\n";
        let block = find_data_block(text, "time", "P_Wh", "#", ';');
        assert_eq!(block.as_ref().map(|b| b.rows.len()), Some(4));
        assert_eq!(block.as_ref().map(|b| b.footer_lines), Some(0));
        assert_eq!(
            block.and_then(|b| b.rows.last().copied()),
            Some("2020-01-01T03:00:00;4")
        );
    }

    #[test]
    fn lines_without_delimiter_between_rows_are_kept() {
        let text = "time;P_Wh\n2020-01-01T00:00:00;1\nstray\n2020-01-01T01:00:00;2\nnote\n";
        let block = find_data_block(text, "time", "P_Wh", "#", ';');
        assert_eq!(
            block.as_ref().map(|b| b.rows.clone()),
            Some(vec!["2020-01-01T00:00:00;1", "stray", "2020-01-01T01:00:00;2"])
        );
        assert_eq!(block.map(|b| b.footer_lines), Some(1));
    }

    #[test]
    fn header_on_first_line() {
        let text = "time;P_Wh\r\n2020-01-01T00:00:00;5\r\n";
        let block = find_data_block(text, "time", "P_Wh", "#", ';');
        assert_eq!(block.as_ref().map(|b| b.header_line), Some(0));
        assert_eq!(
            block.map(|b| b.to_csv_text()).as_deref(),
            Some("time;P_Wh\n2020-01-01T00:00:00;5\n")
        );
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(find_data_block("time;power\n1;2\n", "time", "P_Wh", "#", ';').is_none());
    }

    #[test]
    fn empty_comment_prefix_disables_comment_check() {
        let block = find_data_block("#time;P_Wh\n", "time", "P_Wh", "", ';');
        assert_eq!(block.map(|b| b.header), Some("#time;P_Wh"));
    }
}
