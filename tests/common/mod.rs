#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{CoderResult, WINDOWS_1252};
use tempfile::{TempDir, tempdir};

pub const RAW_HEADER: &str =
    "Ano;ID CNAE;CNAE;Massa Salarial;Salário Médio;Número de empregos;Ganho de Oportunidade";

pub const LOOKUP: &str = "ID CNAE,SETOR\n4711,Comércio\n0111,Agropecuária\n";

pub const RATES: &str = r#"{"2019": 12.0, "2020": "10"}"#;

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Raw table with the export header followed by `rows`.
pub fn raw_table(rows: &[&str]) -> String {
    let mut text = String::from(RAW_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

pub fn encode_latin1(text: &str) -> Vec<u8> {
    let mut encoder = WINDOWS_1252.new_encoder();
    let mut out = vec![0u8; text.len() * 2 + 8];
    let (result, _, written, _) = encoder.encode_from_utf8(text, &mut out, true);
    assert_eq!(result, CoderResult::InputEmpty);
    out.truncate(written);
    out
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.join(name)).expect("read output file")
    }

    /// Data lines of a `;`-separated output, header excluded.
    pub fn rows(&self, name: &str) -> Vec<Vec<String>> {
        self.read(name)
            .lines()
            .skip(1)
            .map(|line| line.split(';').map(str::to_string).collect())
            .collect()
    }

    /// Every entry currently in the workspace directory, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names = fs::read_dir(self.path())
            .expect("list workspace")
            .map(|entry| {
                entry
                    .expect("workspace entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}
