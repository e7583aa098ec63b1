use std::path::PathBuf;

/// Environment-backed defaults; command-line flags win over these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub dataset: String,
    pub json_logs: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            source_dir: lookup("METRICS_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            output_dir: lookup("METRICS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./out")),
            dataset: lookup("METRICS_DATASET")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "dataset".to_string()),
            json_logs: lookup("METRICS_LOG_FORMAT")
                .map(|value| value.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn with_overrides(
        mut self,
        source_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
        dataset: Option<String>,
    ) -> Self {
        if let Some(dir) = source_dir {
            self.source_dir = dir;
        }
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        if let Some(name) = dataset {
            self.dataset = name;
        }
        self
    }
}
