//! Line-by-line product filter for exported report CSVs.
//!
//! The portal's CSV export opens with a fixed block of title/metadata rows
//! followed by one data row per line item. Header rows pass through
//! verbatim; a data row is kept when its first comma-delimited field,
//! trimmed, contains the product key.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Keep/drop decision for each line of a report export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    header_lines: usize,
    key: String,
}

/// Line counts observed by [`filter_lines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub header: usize,
    pub kept: usize,
    pub dropped: usize,
}

impl RowFilter {
    pub fn new(header_lines: usize, key: impl Into<String>) -> Self {
        Self {
            header_lines,
            key: key.into(),
        }
    }

    pub fn header_lines(&self) -> usize {
        self.header_lines
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decides whether the zero-based `index`-th line belongs in the output.
    ///
    /// Matching is a case-sensitive substring test, so `Ball` also keeps
    /// `Ball 2024 XL` rows.
    pub fn keep(&self, index: usize, line: &[u8]) -> bool {
        index < self.header_lines || leading_field(line).contains(self.key.as_str())
    }
}

/// First comma-delimited field of a raw CSV line, trimmed.
pub fn leading_field(line: &[u8]) -> String {
    let field = line.split(|b| *b == b',').next().unwrap_or(line);
    String::from_utf8_lossy(field).trim().to_string()
}

/// Streams `reader` into `writer`, copying only the lines `filter` keeps.
///
/// Lines are copied byte for byte with their original terminators; a final
/// unterminated line is treated like any other.
pub async fn filter_lines<R, W>(
    mut reader: R,
    writer: &mut W,
    filter: &RowFilter,
) -> std::io::Result<FilterStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = FilterStats::default();
    let mut line = Vec::new();
    let mut index = 0usize;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if filter.keep(index, &line) {
            writer.write_all(&line).await?;
            if index < filter.header_lines() {
                stats.header += 1;
            } else {
                stats.kept += 1;
            }
        } else {
            stats.dropped += 1;
        }
        index += 1;
    }
    writer.flush().await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "Sales Report\n\
        Organisation,CSS\n\
        From,01/01/2000\n\
        To,01/01/2100\n\
        Product,Quantity,Total\n\
        Ball 2024,5,10.00\n\
        Hoodie,3,20.00\n";

    async fn run(input: &str, header_lines: usize, key: &str) -> (String, FilterStats) {
        let mut out = Vec::new();
        let stats = filter_lines(input.as_bytes(), &mut out, &RowFilter::new(header_lines, key))
            .await
            .unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[tokio::test]
    async fn keeps_header_block_and_matching_rows() {
        let (out, stats) = run(REPORT, 5, "Ball 2024").await;
        assert_eq!(
            out,
            "Sales Report\nOrganisation,CSS\nFrom,01/01/2000\nTo,01/01/2100\nProduct,Quantity,Total\nBall 2024,5,10.00\n"
        );
        assert_eq!(
            stats,
            FilterStats {
                header: 5,
                kept: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn filter_reports_its_settings() {
        let filter = RowFilter::new(5, String::from("Ball 2024"));
        assert_eq!(filter.header_lines(), 5);
        assert_eq!(filter.key(), "Ball 2024");
        assert!(filter.keep(4, b"anything"));
        assert!(!filter.keep(5, b"Hoodie,3,20.00"));
    }

    #[tokio::test]
    async fn header_lines_pass_even_when_they_do_not_match() {
        let (out, _) = run(REPORT, 2, "Hoodie").await;
        assert_eq!(out, "Sales Report\nOrganisation,CSS\nHoodie,3,20.00\n");
    }

    #[tokio::test]
    async fn substring_match_over_matches() {
        let input = "h\nBall 2024 XL,1,1\nBall 2024,1,1\nball 2024,1,1\n";
        let (out, stats) = run(input, 1, "Ball 2024").await;
        assert_eq!(out, "h\nBall 2024 XL,1,1\nBall 2024,1,1\n");
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn crlf_and_unterminated_last_line_are_preserved() {
        let input = "h1\r\nh2\r\n  Ball 2024 ,2,4.00\r\nBall 2024,1,2.00";
        let (out, stats) = run(input, 2, "Ball 2024").await;
        assert_eq!(out, input);
        assert_eq!(stats.kept, 2);
    }

    #[tokio::test]
    async fn short_input_yields_only_header_lines() {
        let (out, stats) = run("only\n", 4, "x").await;
        assert_eq!(out, "only\n");
        assert_eq!(stats.header, 1);
        assert_eq!(stats.kept, 0);
    }

    #[tokio::test]
    async fn row_without_comma_matches_on_whole_line() {
        let (out, _) = run("h\nBall 2024\nother\n", 1, "Ball").await;
        assert_eq!(out, "h\nBall 2024\n");
    }

    #[test]
    fn leading_field_trims_and_handles_invalid_utf8() {
        assert_eq!(leading_field(b"  Hoodie  ,3"), "Hoodie");
        assert_eq!(leading_field(b"\xffBall,1"), "\u{fffd}Ball");
        assert_eq!(leading_field(b"Ball\n"), "Ball");
    }

    #[test]
    fn keep_is_a_function_of_index_and_line() {
        let filter = RowFilter::new(3, "Ball");
        assert!(filter.keep(0, b"anything"));
        assert!(filter.keep(2, b"anything"));
        assert!(!filter.keep(3, b"anything"));
        assert!(filter.keep(3, b"Ball 2024,1"));
        assert!(!filter.keep(4, b"Hoodie,Ball"));
    }
}
