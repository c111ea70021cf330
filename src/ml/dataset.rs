use crate::error::{AppError, Result};
use crate::ml::models::{Label, LabeledExample, TrainingConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const BUILTIN_FAKE: [&str; 5] = [
    "Scientists discover that drinking water is actually harmful to your health",
    "Breaking: Aliens have landed in New York City and are demanding pizza",
    "Government announces that gravity will be turned off next Tuesday",
    "Local man discovers that vegetables are actually made of plastic",
    "Study shows that reading fake news makes you 200% smarter",
];

const BUILTIN_REAL: [&str; 5] = [
    "Stock market shows steady growth in technology sector this quarter",
    "New research reveals promising results for cancer treatment",
    "City council approves budget for new public transportation system",
    "Weather forecast predicts mild temperatures for the upcoming week",
    "University announces new scholarship program for underprivileged students",
];

/// Where training rows come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Ten hand-written headlines, enough to keep the service usable
    BuiltinSample,

    /// CSV file with `text` and `label` columns
    Csv(PathBuf),
}

impl DataSource {
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => DataSource::Csv(p.to_path_buf()),
            None => DataSource::BuiltinSample,
        }
    }

    pub fn load(&self, config: &TrainingConfig) -> Result<Vec<LabeledExample>> {
        match self {
            DataSource::BuiltinSample => Ok(builtin_sample()),
            DataSource::Csv(path) => load_csv(path, config),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::BuiltinSample => "builtin_sample".to_string(),
            DataSource::Csv(path) => path.display().to_string(),
        }
    }
}

/// Five fake and five real headlines
pub fn builtin_sample() -> Vec<LabeledExample> {
    BUILTIN_FAKE
        .iter()
        .map(|text| LabeledExample::new(*text, Label::Fake))
        .chain(
            BUILTIN_REAL
                .iter()
                .map(|text| LabeledExample::new(*text, Label::Real)),
        )
        .collect()
}

/// Cell values pandas reads as missing by default
const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One dataset row; other columns are ignored
#[derive(Debug, Deserialize)]
struct NewsRecord {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// A cell counts as missing when absent, blank or an NA token
fn present(cell: Option<String>) -> Option<String> {
    cell.filter(|s| !NA_TOKENS.contains(&s.as_str()))
}

/// Load a labelled CSV dataset (ISO-8859-1), downsampled to `max_rows`
pub fn load_csv(path: &Path, config: &TrainingConfig) -> Result<Vec<LabeledExample>> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::DataLoad(format!("Cannot read {}: {}", path.display(), e)))?;
    // Latin-1 maps every byte to the code point of the same value
    let content: String = bytes.iter().map(|&b| b as char).collect();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    for column in ["text", "label"] {
        if !headers.iter().any(|h| h == column) {
            return Err(AppError::DataLoad(format!(
                "Dataset has no '{}' column",
                column
            )));
        }
    }
    reader.set_headers(headers);

    let mut rows: Vec<NewsRecord> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;

    let total = rows.len();
    if total > config.max_rows {
        let mut rng = StdRng::seed_from_u64(config.seed);
        rows.shuffle(&mut rng);
        rows.truncate(config.max_rows);
        tracing::info!(
            total,
            kept = config.max_rows,
            "Downsampled dataset"
        );
    }

    let candidates = rows.len();
    let examples: Vec<LabeledExample> = rows
        .into_iter()
        .filter_map(|row| {
            let text = present(row.text)?;
            let label = present(row.label)?.parse::<Label>().ok()?;
            Some(LabeledExample::new(text, label))
        })
        .collect();

    let dropped = candidates - examples.len();
    if dropped > 0 {
        tracing::warn!(dropped, path = %path.display(), "Dropped unusable dataset rows");
    }

    if examples.is_empty() {
        return Err(AppError::DataLoad(format!(
            "No usable rows in {}",
            path.display()
        )));
    }

    Ok(examples)
}

/// Seeded shuffle split into `(train, test)` index lists; the test share is rounded up
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Configuration(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n < 2 {
        return Err(AppError::Training(format!(
            "Need at least 2 examples to split, got {}",
            n
        )));
    }

    let n_test = ((test_size * n as f64).ceil() as usize).clamp(1, n - 1);

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok((train, permutation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_builtin_sample_is_balanced() {
        let sample = builtin_sample();
        assert_eq!(sample.len(), 10);
        assert_eq!(sample.iter().filter(|e| e.label == Label::Fake).count(), 5);
        assert_eq!(
            DataSource::from_path(None).describe(),
            "builtin_sample".to_string()
        );
    }

    #[test]
    fn test_load_csv_drops_bad_rows() {
        let file = write_csv(
            b"title,text,label\n\
              a,Aliens land in Ohio,1\n\
              b,Budget approved,0\n\
              c,,1\n\
              d,NaN,0\n\
              e,No label here,\n\
              f,Weird label,maybe\n\
              g,Markets rally,REAL\n\
              h,null,1\n",
        );
        let examples = load_csv(file.path(), &TrainingConfig::default()).unwrap();

        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].label, Label::Fake);
        assert_eq!(examples[2].label, Label::Real);
    }

    #[test]
    fn test_load_csv_keeps_numeric_looking_text() {
        let file = write_csv(b"text,label
Aliens land,1
Budget passes,0
2024,1
NaN,0
inf,1
");
        let examples = load_csv(file.path(), &TrainingConfig::default()).unwrap();

        let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Aliens land", "Budget passes", "2024", "inf"]);
    }

    #[test]
    fn test_load_csv_matches_headers_case_insensitively() {
        let file = write_csv(b"ID,Text,LABEL,extra
1,Moon made of cheese,1,x
2,Rates held,0
");
        let examples = load_csv(file.path(), &TrainingConfig::default()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1], LabeledExample::new("Rates held", Label::Real));
    }

    #[test]
    fn test_load_csv_decodes_latin1() {
        let file = write_csv(b"text,label\nCaf\xe9 owner wins lottery,1\nPlain news,0\n");
        let examples = load_csv(file.path(), &TrainingConfig::default()).unwrap();
        assert_eq!(examples[0].text, "Caf\u{e9} owner wins lottery");
    }

    #[test]
    fn test_load_csv_downsamples() {
        let mut content = String::from("text,label\n");
        for i in 0..50 {
            content.push_str(&format!("article number {},{}\n", i, i % 2));
        }
        let file = write_csv(content.as_bytes());
        let config = TrainingConfig {
            max_rows: 20,
            ..TrainingConfig::default()
        };

        let first = load_csv(file.path(), &config).unwrap();
        let second = load_csv(file.path(), &config).unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_csv_errors() {
        let missing = load_csv(Path::new("/no/such/file.csv"), &TrainingConfig::default());
        assert!(matches!(missing, Err(AppError::DataLoad(_))));

        let file = write_csv(b"body,label\nhello,1\n");
        let no_column = load_csv(file.path(), &TrainingConfig::default());
        assert!(matches!(no_column, Err(AppError::DataLoad(_))));

        let file = write_csv(b"text,label\n,1\n");
        let empty = load_csv(file.path(), &TrainingConfig::default());
        assert!(matches!(empty, Err(AppError::DataLoad(_))));
    }

    #[test]
    fn test_split_indices() {
        let (train, test) = split_indices(10, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(split_indices(10, 0.2, 42).unwrap(), (train, test));
        assert_eq!(split_indices(11, 0.2, 42).unwrap().1.len(), 3);
        assert!(split_indices(1, 0.2, 42).is_err());
        assert!(split_indices(10, 1.5, 42).is_err());
    }
}
