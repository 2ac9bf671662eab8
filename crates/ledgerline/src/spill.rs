//! JSONL spill files for inter-stage streams.
//!
//! Each stage writes one record per line to a local spill file that is
//! uploaded to the object store when the stage completes. Spill files live
//! in a per-job temp directory so concurrent jobs cannot collide; the
//! directory is removed when the job finishes, successfully or not.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Job-scoped directory for spill and output files.
#[derive(Debug)]
pub struct SpillDir {
    root: PathBuf,
}

impl SpillDir {
    /// Create (or reuse) the spill directory for a job.
    pub fn for_job(job_id: &str) -> Result<Self> {
        let root = std::env::temp_dir().join(format!("ledgerline-{job_id}"));
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of a stage's JSONL stream inside this directory.
    pub fn stream_path(&self, stage: &str) -> PathBuf {
        self.root.join(format!("{stage}.jsonl"))
    }

    /// Path of an arbitrary file inside this directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Drop for SpillDir {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_dir_all(&self.root) {
            tracing::warn!(path = %self.root.display(), %error, "failed to clean up spill directory");
        }
    }
}

/// Streaming writer for a JSONL record stream.
pub struct JsonlWriter<T> {
    writer: BufWriter<File>,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create (truncate) the stream at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            count: 0,
            _marker: PhantomData,
        })
    }

    /// Append one record.
    pub fn write(&mut self, item: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, item)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.count)
    }
}

/// Streaming reader for a JSONL record stream.
///
/// Blank lines are skipped; undecodable lines are logged and skipped, as a
/// truncated line must not sink the whole stream.
pub struct JsonlReader<T> {
    lines: std::io::Lines<BufReader<File>>,
    path: PathBuf,
    line_number: usize,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Open the stream at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            lines: BufReader::new(File::open(path)?).lines(),
            path: path.to_path_buf(),
            line_number: 0,
            _marker: PhantomData,
        })
    }

    /// Read the first record of a single-record stream.
    pub fn read_single(path: &Path) -> Result<Option<T>> {
        let mut reader = Self::open(path)?;
        reader.next().transpose()
    }
}

impl<T: DeserializeOwned> Iterator for JsonlReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(item) => return Some(Ok(item)),
                Err(error) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line_number = self.line_number,
                        %error,
                        "skipping invalid JSONL line"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: usize,
        label: String,
    }

    fn rec(id: usize) -> Rec {
        Rec {
            id,
            label: format!("row-{id}"),
        }
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.jsonl");

        let mut writer = JsonlWriter::create(&path).unwrap();
        writer.write(&rec(1)).unwrap();
        writer.write(&rec(2)).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let items: Vec<Rec> = JsonlReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items, vec![rec(1), rec(2)]);
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.jsonl");
        std::fs::write(
            &path,
            "{\"id\":1,\"label\":\"row-1\"}\nnot json\n\n{\"id\":2,\"label\":\"row-2\"}\n",
        )
        .unwrap();

        let items: Vec<Rec> = JsonlReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], rec(2));
    }

    #[test]
    fn read_single_takes_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.jsonl");
        let mut writer = JsonlWriter::create(&path).unwrap();
        writer.write(&rec(7)).unwrap();
        writer.finish().unwrap();

        let item: Option<Rec> = JsonlReader::read_single(&path).unwrap();
        assert_eq!(item, Some(rec(7)));
    }

    #[test]
    fn spill_dir_is_removed_on_drop() {
        let root;
        {
            let spill = SpillDir::for_job("test-job-cleanup").unwrap();
            root = spill.stream_path("clean_data").parent().unwrap().to_path_buf();
            std::fs::write(spill.stream_path("clean_data"), "{}\n").unwrap();
            assert!(root.exists());
        }
        assert!(!root.exists());
    }
}
