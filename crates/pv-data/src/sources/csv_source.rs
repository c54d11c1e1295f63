use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::debug;

use crate::config::CsvOptions;
use crate::scale::{self, ScaleName};
use crate::series::{Point, Series};
use crate::DataError;

/// Where a requested column comes from
#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Scale(ScaleName),
    Field(usize),
    Missing,
}

impl Column {
    fn resolve(name: &str, headers: &StringRecord) -> Self {
        if let Some(scale) = ScaleName::parse(name) {
            return Column::Scale(scale);
        }
        headers
            .iter()
            .position(|header| header == name)
            .map_or(Column::Missing, Column::Field)
    }

    /// Value for one row, `None` when the row has no such field
    fn value(&self, row_index: usize, record: &StringRecord, options: &CsvOptions) -> Option<f64> {
        match *self {
            Column::Scale(scale) => Some(scale.resolve(row_index)),
            Column::Field(idx) => record.get(idx).map(|raw| options.coerce(raw)),
            Column::Missing => None,
        }
    }
}

/// Reads column names and (x, y) series out of CSV files
#[derive(Debug, Clone, Default)]
pub struct CsvSeriesExtractor {
    options: CsvOptions,
}

impl CsvSeriesExtractor {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Scale names followed by the file's headers in file order
    pub async fn list_columns(&self, path: &Path) -> Result<Vec<String>, DataError> {
        tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let options = self.options.clone();
            move || Self::read_columns(&path, &options)
        })
        .await?
    }

    /// Series of (x, y) for every data row.
    ///
    /// Fails as a whole when a row has neither column; never returns a partial series.
    pub async fn extract_series(&self, path: &Path, x_column: &str, y_column: &str) -> Result<Series, DataError> {
        tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let options = self.options.clone();
            let x_column = x_column.to_string();
            let y_column = y_column.to_string();
            move || Self::read_series(&path, &x_column, &y_column, &options)
        })
        .await?
    }

    /// Several (x, y) series from a single pass over the file, in `pairs` order.
    ///
    /// Fails as a whole when any pair hits a row with neither of its columns.
    pub async fn extract_series_set(&self, path: &Path, pairs: Vec<(String, String)>) -> Result<Vec<Series>, DataError> {
        tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let options = self.options.clone();
            move || Self::read_series_set(&path, &pairs, &options)
        })
        .await?
    }

    /// Blocking version of [`Self::list_columns`]
    pub fn read_columns(path: &Path, options: &CsvOptions) -> Result<Vec<String>, DataError> {
        let mut reader = Self::open(path, options)?;
        let headers = reader.headers()?;

        let columns: Vec<String> = scale::names()
            .map(str::to_string)
            .chain(headers.iter().map(str::to_string))
            .collect();
        debug!(path = %path.display(), columns = columns.len(), "Read CSV headers");
        Ok(columns)
    }

    /// Blocking version of [`Self::extract_series`]
    pub fn read_series(path: &Path, x_column: &str, y_column: &str, options: &CsvOptions) -> Result<Series, DataError> {
        let pairs = [(x_column.to_string(), y_column.to_string())];
        Ok(Self::read_series_set(path, &pairs, options)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Blocking version of [`Self::extract_series_set`]
    pub fn read_series_set(
        path: &Path,
        pairs: &[(String, String)],
        options: &CsvOptions,
    ) -> Result<Vec<Series>, DataError> {
        let mut reader = Self::open(path, options)?;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let headers = reader.headers()?.clone();
        let columns: Vec<(Column, Column)> = pairs
            .iter()
            .map(|(x, y)| (Column::resolve(x, &headers), Column::resolve(y, &headers)))
            .collect();

        let mut set = vec![Series::default(); pairs.len()];
        let mut record = StringRecord::new();
        let mut row_index = 0usize;

        while reader.read_record(&mut record)? {
            for (((x_column, y_column), (x, y)), series) in pairs.iter().zip(&columns).zip(set.iter_mut()) {
                let point = match (x.value(row_index, &record, options), y.value(row_index, &record, options)) {
                    (None, None) => {
                        return Err(DataError::MalformedRow {
                            row: row_index,
                            x_column: x_column.clone(),
                            y_column: y_column.clone(),
                        });
                    }
                    (px, py) => Point::new(px.unwrap_or(f64::NAN), py.unwrap_or(f64::NAN)),
                };
                series.push(point);
            }
            row_index += 1;
        }

        debug!(
            path = %path.display(),
            series = set.len(),
            rows = row_index,
            "Extracted series"
        );
        Ok(set)
    }

    fn open(path: &Path, options: &CsvOptions) -> Result<Reader<BufReader<File>>, DataError> {
        let file = File::open(path).map_err(|e| not_found_or_io(path.to_path_buf(), e))?;
        Ok(ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.delimiter_byte()?)
            .from_reader(BufReader::new(file)))
    }
}

fn not_found_or_io(path: PathBuf, error: io::Error) -> DataError {
    match error.kind() {
        io::ErrorKind::NotFound => DataError::NotFound(path),
        _ => DataError::Io(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_columns_list_scales_first() {
        let file = csv_file("t,v\n0,1\n1,2\n2,3\n");
        let columns = CsvSeriesExtractor::default().list_columns(file.path()).await.unwrap();
        assert_eq!(columns, ["linear scale", "logarithmic scale", "t", "v"]);
    }

    #[tokio::test]
    async fn test_empty_file_has_only_scales() {
        let file = csv_file("");
        let columns = CsvSeriesExtractor::default().list_columns(file.path()).await.unwrap();
        assert_eq!(columns, ["linear scale", "logarithmic scale"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvSeriesExtractor::default()
            .list_columns(&dir.path().join("gone.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_linear_scale_against_column() {
        let file = csv_file("t,v\n0,1\n1,2\n2,3\n");
        let series = CsvSeriesExtractor::default()
            .extract_series(file.path(), "linear scale", "v")
            .await
            .unwrap();
        assert_eq!(
            series.points(),
            &[Point::new(0.0, 1.0), Point::new(1.0, 2.0), Point::new(2.0, 3.0)]
        );
    }

    #[tokio::test]
    async fn test_scale_shadows_header() {
        let file = csv_file("linear scale,v\n10,1\n20,2\n");
        let series = CsvSeriesExtractor::default()
            .extract_series(file.path(), "linear scale", "v")
            .await
            .unwrap();
        assert_eq!(series.points()[1].x, 1.0);
    }

    #[test]
    fn test_coercion_keeps_every_row() {
        let file = csv_file("a,b\n1,x\n,2\n3\n");
        let series = CsvSeriesExtractor::read_series(file.path(), "a", "b", &CsvOptions::default()).unwrap();
        let points = series.points();
        assert_eq!(points.len(), 3);
        assert!(points[0].y.is_nan());
        assert_eq!(points[1], Point::new(0.0, 2.0));
        assert_eq!(points[2].x, 3.0);
        assert!(points[2].y.is_nan());
    }

    #[test]
    fn test_row_without_either_column_fails_whole_extraction() {
        let file = csv_file("a,b\n1,2\n3,4\n");
        let err = CsvSeriesExtractor::read_series(file.path(), "nope", "also nope", &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::MalformedRow { row: 0, .. }));
    }

    #[test]
    fn test_one_missing_column_is_nan() {
        let file = csv_file("a,b\n1,2\n");
        let series = CsvSeriesExtractor::read_series(file.path(), "a", "nope", &CsvOptions::default()).unwrap();
        assert_eq!(series.points()[0].x, 1.0);
        assert!(series.points()[0].y.is_nan());
    }

    #[test]
    fn test_logarithmic_scale_starts_at_negative_infinity() {
        let file = csv_file("v\n5\n6\n");
        let series = CsvSeriesExtractor::read_series(file.path(), "logarithmic scale", "v", &CsvOptions::default()).unwrap();
        assert_eq!(series.points()[0].x, f64::NEG_INFINITY);
        assert_eq!(series.points()[1].x, 0.0);
    }

    #[test]
    fn test_custom_delimiter() {
        let file = csv_file("t;v\n0;7\n");
        let options = CsvOptions {
            delimiter: ';',
            ..CsvOptions::default()
        };
        let series = CsvSeriesExtractor::read_series(file.path(), "t", "v", &options).unwrap();
        assert_eq!(series.points(), &[Point::new(0.0, 7.0)]);
    }

    #[tokio::test]
    async fn test_series_set_matches_single_extractions() {
        let file = csv_file("t,a,b\n0,1,10\n1,2,20\n2,3,30\n");
        let extractor = CsvSeriesExtractor::default();
        let pairs = vec![
            ("t".to_string(), "a".to_string()),
            ("linear scale".to_string(), "b".to_string()),
        ];

        let set = extractor.extract_series_set(file.path(), pairs).await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set[0], extractor.extract_series(file.path(), "t", "a").await.unwrap());
        assert_eq!(set[1], extractor.extract_series(file.path(), "linear scale", "b").await.unwrap());
    }

    #[test]
    fn test_series_set_fails_when_any_pair_is_malformed() {
        let file = csv_file("a,b\n1,2\n");
        let pairs = vec![
            ("a".to_string(), "b".to_string()),
            ("x".to_string(), "y".to_string()),
        ];
        let err = CsvSeriesExtractor::read_series_set(file.path(), &pairs, &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::MalformedRow { row: 0, ref x_column, .. } if x_column == "x"));
    }
}
