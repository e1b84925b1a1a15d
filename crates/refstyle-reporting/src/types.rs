use std::fmt;
use std::str::FromStr;

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Text, ExportFormat::Markdown, ExportFormat::Json]
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown report format '{}' (expected text, markdown or json)",
                s
            )),
        }
    }
}

/// Presentation details that are not part of the analysis itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Name shown in the report header, usually the input file name.
    pub source_name: String,
    /// Append a Google Scholar search link to each entry.
    pub scholar_links: bool,
}

impl ReportOptions {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            scholar_links: false,
        }
    }

    pub fn with_scholar_links(mut self, on: bool) -> Self {
        self.scholar_links = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("text".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert_eq!(" Markdown ".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert_eq!("md".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_format_names_round_trip() {
        for format in ExportFormat::all() {
            assert_eq!(ExportFormat::from_str(format.as_str()), Ok(*format));
        }
    }
}
