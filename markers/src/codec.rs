//! Reader/writer for the fixed-width marker text format.
//!
//! One record per line: `INDEX X Y Z`, index right-aligned in 6
//! characters, coordinates right-aligned in 11 with 6 decimal places.
//! Reading is best-effort: malformed lines are skipped with a warning
//! so a partially damaged tracking file still yields every intact
//! record, in file order.

use log::warn;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;

use crate::marker::MarkerSet;

/// Token count of a well-formed raw line once split on `\s+`.
///
/// The leading indentation yields an empty first token and the line
/// terminator an empty last one, so the four fields sit at tokens 1–4.
const RECORD_TOKENS: usize = 6;

fn whitespace() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Write one formatted line per marker, in set order.
///
/// An invalid marker formats to nothing but still terminates its line,
/// so the output line count always equals the set length. Downstream
/// parsers count lines; dropping the blank would shift every record
/// after it.
pub fn write_markers<W: Write>(markers: &MarkerSet, dest: &mut W) -> io::Result<()> {
    for m in markers {
        writeln!(dest, "{}", m.format_record().unwrap_or_default())?;
    }
    Ok(())
}

/// Write a marker set to a text file, replacing any existing content.
pub fn write_markers_file<P: AsRef<Path>>(markers: &MarkerSet, path: P) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_markers(markers, &mut writer)?;
    writer.flush()
}

/// Read whitespace-delimited marker records, one per line.
///
/// A line is accepted only if splitting the raw line (terminator
/// included) on whitespace yields exactly [`RECORD_TOKENS`] tokens and
/// the four fields parse numerically. Anything else is skipped with a
/// warning; the resulting set is simply shorter than the line count.
pub fn read_markers<R: BufRead>(mut src: R) -> io::Result<MarkerSet> {
    let mut markers = MarkerSet::new();
    let mut line = String::new();

    loop {
        line.clear();
        if src.read_line(&mut line)? == 0 {
            break;
        }
        // A final line without a terminator still needs its trailing
        // empty token to count like every other record.
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let tokens: Vec<&str> = whitespace().split(&line).collect();
        if tokens.len() != RECORD_TOKENS {
            warn!(
                "skipping line with invalid element count {} ({})",
                tokens.len(),
                line.trim_end()
            );
            continue;
        }

        let parsed = (
            tokens[1].parse::<i64>(),
            tokens[2].parse::<f64>(),
            tokens[3].parse::<f64>(),
            tokens[4].parse::<f64>(),
        );
        match parsed {
            (Ok(index), Ok(x), Ok(y), Ok(z)) => markers.add(index, x, y, z),
            _ => warn!("skipping unparsable line ({})", line.trim_end()),
        }
    }

    Ok(markers)
}

/// Read a marker set from a text file.
pub fn read_markers_file<P: AsRef<Path>>(path: P) -> io::Result<MarkerSet> {
    read_markers(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use tempfile::TempDir;

    #[test]
    fn test_write_empty_set_is_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.txt");
        write_markers_file(&MarkerSet::new(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_write_markers_exact_lines() {
        let mut markers = MarkerSet::new();
        markers.add(1, 2.0, 3.0, 4.0);
        markers.add(2, 3.0, 4.0, 5.0);

        let mut out = Vec::new();
        write_markers(&markers, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                "     1    2.000000    3.000000    4.000000\n",
                "     2    3.000000    4.000000    5.000000\n"
            )
        );
    }

    #[test]
    fn test_invalid_marker_writes_blank_line() {
        let mut markers = MarkerSet::new();
        markers.add(1, 2.0, 3.0, 4.0);
        markers.push(Marker::from_parts(Some(2), None, None, None));
        markers.add(3, 4.0, 5.0, 6.0);

        let mut out = Vec::new();
        write_markers(&markers, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().nth(1), Some(""));

        // the blank line drops out again on read
        let parsed = read_markers(text.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.markers()[1].index(), Some(3));
    }

    #[test]
    fn test_read_single_record() {
        let input = "     1  442.000000  633.000000   12.000000\n";
        let markers = read_markers(input.as_bytes()).unwrap();
        assert_eq!(markers.len(), 1);
        let m = &markers.markers()[0];
        assert_eq!(m.index(), Some(1));
        assert_eq!(m.x(), Some(442.0));
        assert_eq!(m.y(), Some(633.0));
        assert_eq!(m.z(), Some(12.0));
    }

    #[test]
    fn test_read_skips_malformed_lines_preserving_order() {
        let input = concat!(
            "     1  442.000000  633.000000   12.000000\n",
            "     2  452.000000  485.000000\n",
            "    10  451.000000  471.000000  100.000000\n"
        );
        let markers = read_markers(input.as_bytes()).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers.markers()[0].index(), Some(1));
        assert_eq!(markers.markers()[1].index(), Some(10));
        assert_eq!(markers.markers()[1].z(), Some(100.0));
    }

    #[test]
    fn test_read_skips_unparsable_fields() {
        let input = concat!(
            "     1  442.000000  633.000000   12.000000\n",
            "     x  452.000000  485.000000   12.000000\n"
        );
        let markers = read_markers(input.as_bytes()).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers.markers()[0].index(), Some(1));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_markers_file(temp_dir.path().join("noexist")).is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut markers = MarkerSet::new();
        markers.add(1, 442.0, 633.0, 12.0);
        markers.add(1, 452.25, 485.5, 12.0);
        markers.add(10, -451.0, 471.0, 100.125);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("3Dmarkers.txt");
        write_markers_file(&markers, &path).unwrap();
        let reloaded = read_markers_file(&path).unwrap();
        assert_eq!(reloaded, markers);
    }
}
