//! `brisk.toml` configuration (SPEC_FULL.md §14).
//!
//! Read from the current directory first, then `$HOME/.config/brisk/`; a
//! missing file or a missing field both fall back to spec.md §4.5's
//! built-in defaults, so this file only ever *extends* what the interpreter
//! does without it, never narrows it.
//!
//! ```toml
//! [headers]
//! include_dirs = ["/usr/include", "/usr/local/include"]
//!
//! [[headers.library_hints]]
//! header_contains = "SDL2"
//! library = "SDL2"
//! ```

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub headers: HeadersConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeadersConfig {
    #[serde(default)]
    pub include_dirs: Vec<String>,
    #[serde(default)]
    pub library_hints: Vec<LibraryHint>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryHint {
    pub header_contains: String,
    pub library: String,
}

impl Config {
    /// Looks for `brisk.toml` in the current directory, then under
    /// `$HOME/.config/brisk/`. Returns the default (empty) configuration if
    /// neither is present or parseable — a bad config file is a warning,
    /// not a hard failure, matching the teacher's "absence is fine"
    /// convention for optional project files.
    pub fn load() -> Config {
        for candidate in Self::candidate_paths() {
            if let Ok(text) = std::fs::read_to_string(&candidate) {
                match toml::from_str(&text) {
                    Ok(cfg) => {
                        tracing::debug!(path = %candidate.display(), "loaded brisk.toml");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(path = %candidate.display(), error = %e, "ignoring malformed brisk.toml");
                    }
                }
            }
        }
        Config::default()
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("brisk.toml")];
        if let Some(home) = home::home_dir() {
            paths.push(home.join(".config").join("brisk").join("brisk.toml"));
        }
        paths
    }

    /// Flattens `library_hints` into the `(header substring, library name)`
    /// pairs `Interpreter::configure_headers` expects.
    pub fn library_hint_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .library_hints
            .iter()
            .map(|h| (h.header_contains.clone(), h.library.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let text = r#"
            [headers]
            include_dirs = ["/opt/include"]

            [[headers.library_hints]]
            header_contains = "SDL2"
            library = "SDL2"
        "#;
        let cfg: Config = toml::from_str(text).unwrap();
        assert_eq!(cfg.headers.include_dirs, vec!["/opt/include".to_string()]);
        assert_eq!(cfg.library_hint_pairs(), vec![("SDL2".to_string(), "SDL2".to_string())]);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.headers.include_dirs.is_empty());
        assert!(cfg.headers.library_hints.is_empty());
    }
}
