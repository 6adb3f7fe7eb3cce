use anyhow::{Context, Result};
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::cli::CliArgs;

pub const DEFAULT_REFRESH_MS: u64 = 2_000;
pub const MIN_REFRESH_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ConfigFile {
    refresh_ms: Option<u64>,
    read_only: bool,
    dump_dir: Option<PathBuf>,
    favorite_namespaces: Vec<String>,
    styles: StyleSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct StyleSpec {
    fg: Option<String>,
    bg: Option<String>,
    cursor_fg: Option<String>,
    cursor_bg: Option<String>,
    header_fg: Option<String>,
    header_bg: Option<String>,
    sorter: Option<String>,
    filter: Option<String>,
    counter: Option<String>,
    title: Option<String>,
    highlight: Option<String>,
    mark: Option<String>,
}

/// Resolved table colours, handed to every table view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Styles {
    pub fg: Color,
    pub bg: Color,
    pub cursor_fg: Color,
    pub cursor_bg: Color,
    pub header_fg: Color,
    pub header_bg: Color,
    pub sorter: Color,
    pub filter: Color,
    pub counter: Color,
    pub title: Color,
    pub highlight: Color,
    pub mark: Color,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            fg: Color::White,
            bg: Color::Rgb(16, 27, 44),
            cursor_fg: Color::White,
            cursor_bg: Color::Rgb(24, 36, 58),
            header_fg: Color::Rgb(52, 211, 153),
            header_bg: Color::Rgb(16, 27, 44),
            sorter: Color::Rgb(251, 191, 36),
            filter: Color::Rgb(125, 211, 252),
            counter: Color::Rgb(251, 191, 36),
            title: Color::Rgb(52, 211, 153),
            highlight: Color::Rgb(52, 211, 153),
            mark: Color::Rgb(13, 148, 136),
        }
    }
}

impl Styles {
    fn apply(mut self, spec: &StyleSpec) -> Self {
        let slots: [(&Option<String>, &mut Color); 12] = [
            (&spec.fg, &mut self.fg),
            (&spec.bg, &mut self.bg),
            (&spec.cursor_fg, &mut self.cursor_fg),
            (&spec.cursor_bg, &mut self.cursor_bg),
            (&spec.header_fg, &mut self.header_fg),
            (&spec.header_bg, &mut self.header_bg),
            (&spec.sorter, &mut self.sorter),
            (&spec.filter, &mut self.filter),
            (&spec.counter, &mut self.counter),
            (&spec.title, &mut self.title),
            (&spec.highlight, &mut self.highlight),
            (&spec.mark, &mut self.mark),
        ];
        for (value, slot) in slots {
            let Some(value) = value.as_deref() else {
                continue;
            };
            match parse_color(value) {
                Some(color) => *slot = color,
                None => warn!("ignoring unknown colour {value:?}"),
            }
        }
        self
    }
}

/// Accepts ratatui colour names (`red`, `lightblue`) and `#rrggbb`.
pub fn parse_color(value: &str) -> Option<Color> {
    value.trim().parse::<Color>().ok()
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: Option<PathBuf>,
    pub refresh: Duration,
    pub read_only: bool,
    pub dump_dir: PathBuf,
    pub favorite_namespaces: Vec<String>,
    pub styles: Styles,
}

impl RuntimeConfig {
    /// Loads the discovered config file (if any) and applies CLI overrides.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let source = discover_config_path(args.config.as_deref());
        let file = match source.as_deref() {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        Ok(Self::resolve(source, file, args))
    }

    fn resolve(source: Option<PathBuf>, file: ConfigFile, args: &CliArgs) -> Self {
        let refresh_ms = args
            .refresh_ms
            .or(file.refresh_ms)
            .unwrap_or(DEFAULT_REFRESH_MS)
            .max(MIN_REFRESH_MS);
        let favorite_namespaces = file
            .favorite_namespaces
            .into_iter()
            .map(|namespace| namespace.trim().to_string())
            .filter(|namespace| !namespace.is_empty())
            .take(9)
            .collect();

        Self {
            source,
            refresh: Duration::from_millis(refresh_ms),
            read_only: args.readonly || file.read_only,
            dump_dir: file.dump_dir.unwrap_or_else(default_dump_dir),
            favorite_namespaces,
            styles: Styles::default().apply(&file.styles),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn default_dump_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home).join(".config/kubedeck/dumps"),
        _ => std::env::temp_dir().join("kubedeck"),
    }
}

fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("KUBEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubedeck.yaml"),
        PathBuf::from("kubedeck.yml"),
        PathBuf::from(".kubedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kubedeck/config.yaml"),
            PathBuf::from(&home).join(".config/kubedeck/config.yml"),
            PathBuf::from(&home).join(".kubedeck.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{RuntimeConfig, Styles, parse_color, read_config_file};
    use crate::cli::CliArgs;
    use clap::Parser;
    use ratatui::style::Color;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn file_values_load_and_cli_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubedeck.yaml");
        fs::write(
            &path,
            "refreshMs: 1000\nreadOnly: true\ndumpDir: /tmp/dumps\nfavoriteNamespaces: [default, kube-system, ' ']\nstyles:\n  fg: '#112233'\n  mark: red\n  sorter: not-a-colour\n",
        )
        .unwrap();

        let args = CliArgs::parse_from([
            "kubedeck",
            "--config",
            path.to_str().unwrap(),
            "--refresh-ms",
            "100",
        ]);
        let config = RuntimeConfig::load(&args).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.refresh, Duration::from_millis(500));
        assert!(config.read_only);
        assert_eq!(config.dump_dir.to_str(), Some("/tmp/dumps"));
        assert_eq!(config.favorite_namespaces, vec!["default", "kube-system"]);
        assert_eq!(config.styles.fg, Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(config.styles.mark, Color::Red);
        assert_eq!(config.styles.sorter, Styles::default().sorter);
    }

    #[test]
    fn empty_or_missing_fields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "").unwrap();
        let args = CliArgs::parse_from(["kubedeck", "--config", path.to_str().unwrap()]);
        let config = RuntimeConfig::load(&args).unwrap();
        assert_eq!(config.refresh, Duration::from_millis(2_000));
        assert!(!config.read_only);
        assert_eq!(config.styles, Styles::default());
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config_file(&dir.path().join("missing.yaml")).is_err());
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "refreshMs: [").unwrap();
        assert!(read_config_file(&path).is_err());
    }

    #[test]
    fn colours_parse_names_and_hex() {
        assert_eq!(parse_color("lightblue"), Some(Color::LightBlue));
        assert_eq!(parse_color("#ff0000"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(parse_color("nope"), None);
    }
}
