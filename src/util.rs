use crate::datasets::DatasetProvider;
use crate::dto::{GoldRow, Pair, PairSet, RawRecord, Record};
use crate::error::{DedupError, Result};
use csv::{Reader, ReaderBuilder, Writer, WriterBuilder};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

const DELIMITER: u8 = b'\t';
const GOLD_COLUMNS: [&str; 2] = ["id1", "id2"];

fn tsv_reader<R: io::Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .from_reader(reader)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| DedupError::io(path.display(), e))
}

///
/// Reads a headed TSV into raw rows of column name to cell text.
///
/// ## Arguments
///
/// * `reader` - TSV source, header row first.
/// * `source` - Name of the source used in error messages.
///
pub fn read_raw_records<R: io::Read>(reader: R, source: &str) -> Result<Vec<RawRecord>> {
    let mut reader = tsv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| DedupError::csv(source, e))?
        .clone();
    reader
        .records()
        .map(|record| match record {
            Ok(rec) => rec
                .deserialize(Some(&headers))
                .map_err(|e| DedupError::csv(source, e)),
            Err(err) => Err(DedupError::csv(source, err)),
        })
        .collect()
}

/// Parses raw rows with the provider's record parser, keeping row order.
pub fn parse_records(raw: &[RawRecord], provider: &dyn DatasetProvider) -> Result<Vec<Record>> {
    raw.iter().map(|row| provider.parse_record(row)).collect()
}

pub fn load_dataset<P: AsRef<Path>>(path: P, provider: &dyn DatasetProvider) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let raw = read_raw_records(open(path)?, &path.display().to_string())?;
    debug!("Read {} rows from {}", raw.len(), path.display());
    parse_records(&raw, provider)
}

///
/// Reads gold-standard rows from a TSV with `id1` and `id2` columns. Empty
/// cells are kept as `None` so that they can be rejected downstream.
///
pub fn read_gold_rows_from<R: io::Read>(reader: R, source: &str) -> Result<Vec<GoldRow>> {
    let mut reader = tsv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| DedupError::csv(source, e))?
        .clone();
    for column in GOLD_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DedupError::parse(format!(
                "gold standard {} has no '{}' column",
                source, column
            )));
        }
    }
    reader
        .deserialize()
        .map(|row| row.map_err(|e| DedupError::csv(source, e)))
        .collect()
}

pub fn read_gold_rows(path: &Path) -> Result<Vec<GoldRow>> {
    read_gold_rows_from(open(path)?, &path.display().to_string())
}

/// Writes pairs as `id1\tid2` rows under a header, in sorted order.
pub fn write_pairs<W: io::Write>(writer: W, pairs: &PairSet) -> Result<()> {
    let mut sorted: Vec<&Pair> = pairs.iter().collect();
    sorted.sort();
    let mut writer: Writer<W> = WriterBuilder::new().delimiter(DELIMITER).from_writer(writer);
    let to_err = |e: csv::Error| DedupError::csv("pairs output", e);
    writer.write_record(GOLD_COLUMNS).map_err(to_err)?;
    for pair in sorted {
        writer
            .write_record([pair.first(), pair.second()])
            .map_err(to_err)?;
    }
    writer
        .flush()
        .map_err(|e| DedupError::io("pairs output", e))
}

pub fn write_pairs_to_path(path: &Path, pairs: &PairSet) -> Result<()> {
    let file = File::create(path).map_err(|e| DedupError::io(path.display(), e))?;
    write_pairs(file, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::CdProvider;

    #[test]
    fn reads_headed_tsv_rows() {
        let data = "id\tartist\tdtitle\n1\tBjörk\tDebut\n2\tPortishead\tDummy\n";
        let rows = read_raw_records(data.as_bytes(), "inline").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["artist"], "Björk");
        assert_eq!(rows[1]["id"], "2");
    }

    #[test]
    fn ragged_rows_are_csv_errors() {
        let data = "id\tartist\n1\tx\textra\n";
        assert!(matches!(
            read_raw_records(data.as_bytes(), "inline"),
            Err(DedupError::Csv { .. })
        ));
    }

    #[test]
    fn parse_records_uses_the_provider() {
        let data = "id\tartist\tyear\ttracks\n7\tABBA\t1976\t01 Dancing Queen|02 Tiger\n";
        let raw = read_raw_records(data.as_bytes(), "inline").unwrap();
        let records = parse_records(&raw, &CdProvider).unwrap();
        assert_eq!(records[0].id(), "7");
        assert_eq!(
            records[0].list("tracks").unwrap(),
            ["dancing queen".to_string(), "tiger".to_string()]
        );
    }

    #[test]
    fn gold_rows_keep_empty_cells_as_none() {
        let data = "id1\tid2\na\tb\nc\t\n";
        let rows = read_gold_rows_from(data.as_bytes(), "gold").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id1.as_deref(), Some("a"));
        assert_eq!(rows[1].id2, None);
    }

    #[test]
    fn gold_without_id_columns_is_a_parse_error() {
        let data = "left\tright\na\tb\n";
        assert!(matches!(
            read_gold_rows_from(data.as_bytes(), "gold"),
            Err(DedupError::Parse(_))
        ));
    }

    #[test]
    fn pairs_are_written_sorted_and_canonical() {
        let pairs: PairSet = [Pair::new("b", "a"), Pair::new("c", "a")].into_iter().collect();
        let mut out = Vec::new();
        write_pairs(&mut out, &pairs).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id1\tid2\na\tb\na\tc\n");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            read_gold_rows(Path::new("/nonexistent/gold.tsv")),
            Err(DedupError::Io { .. })
        ));
    }
}
