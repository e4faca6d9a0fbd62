//! Broadcast pitches: short promotional texts posted periodically to the
//! monitored groups. Loaded once at startup from a `---`-separated file; a
//! missing file falls back to a single stock pitch.

use std::{fs, path::Path};

use rand::seq::SliceRandom;

const DEFAULT_PITCH: &str = "👋 Freelance VA/dev available — happy to help with your project!";

pub struct PitchBook {
    pitches: Vec<String>,
}

impl PitchBook {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let pitches = match fs::read_to_string(path) {
            Ok(raw) => parse_pitches(&raw),
            Err(err) => {
                tracing::warn!(
                    target: "pitch",
                    path = %path.display(),
                    error = %err,
                    "could not load pitch file, using the default pitch"
                );
                Vec::new()
            }
        };
        tracing::info!(target: "pitch", count = pitches.len(), "pitch book loaded");
        Self { pitches }
    }

    pub fn random_pitch(&self) -> String {
        self.pitches
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PITCH.to_string())
    }
}

fn parse_pitches(raw: &str) -> Vec<String> {
    raw.split("---")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_separated_pitches() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "First pitch\n---\nSecond pitch\n---\n\n").expect("write");

        let book = PitchBook::load(file.path());
        assert_eq!(book.pitches.len(), 2);
        let pitch = book.random_pitch();
        assert!(pitch == "First pitch" || pitch == "Second pitch");
    }

    #[test]
    fn missing_file_uses_default() {
        let book = PitchBook::load("does/not/exist.txt");
        assert_eq!(book.random_pitch(), DEFAULT_PITCH);
    }
}
