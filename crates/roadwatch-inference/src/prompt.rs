//! Captioning prompt loading.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use roadwatch_core::defaults;

/// Read the first readable prompt file among `paths`, or the built-in prompt.
///
/// Called once when the caption client is built; edits to the file take
/// effect on restart.
pub fn load_prompt<P: AsRef<Path>>(paths: &[P]) -> String {
    for path in paths {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(
                    subsystem = "inference",
                    component = "prompt",
                    path = %path.display(),
                    chars = text.chars().count(),
                    "Loaded caption prompt"
                );
                return text;
            }
            Ok(_) => {
                warn!(
                    subsystem = "inference",
                    component = "prompt",
                    path = %path.display(),
                    "Prompt file is empty, skipping"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "prompt",
                    path = %path.display(),
                    error = %e,
                    "Could not read prompt file"
                );
            }
        }
    }
    warn!(
        subsystem = "inference",
        component = "prompt",
        "No prompt file found, using built-in prompt"
    );
    defaults::CAPTION_FALLBACK_PROMPT.to_string()
}

/// Prompt search order: `CAPTION_PROMPT_PATH` if set, then the default locations.
pub fn prompt_paths_from_env() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::env::var("CAPTION_PROMPT_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .into_iter()
        .collect();
    paths.extend(defaults::CAPTION_PROMPT_PATHS.iter().map(PathBuf::from));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_existing_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.txt");
        std::fs::write(&second, "Describe the crash.").unwrap();

        let missing = dir.path().join("missing.txt");
        assert_eq!(load_prompt(&[missing, second]), "Describe the crash.");
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "  \n").unwrap();
        assert_eq!(
            load_prompt(&[empty]),
            defaults::CAPTION_FALLBACK_PROMPT
        );
    }

    #[test]
    fn test_falls_back_to_builtin() {
        let none: [&str; 1] = ["/nonexistent/roadwatch/prompt.txt"];
        assert_eq!(load_prompt(&none), defaults::CAPTION_FALLBACK_PROMPT);
    }
}
