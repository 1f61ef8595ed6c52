//! Durable per-domain CSV artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::PipelineError;

/// A record that occupies one row of an artifact.
pub trait TableRow {
    /// Cell values in header order. Missing values are empty strings.
    fn cells(&self) -> Vec<String>;
}

/// An artifact written by [`TableWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes `<data_dir>/<table>.csv` artifacts.
#[derive(Debug, Clone)]
pub struct TableWriter {
    data_dir: PathBuf,
}

impl TableWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    pub fn artifact_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.csv"))
    }

    /// Replace the artifact for `table` with `header` and `rows`.
    ///
    /// The header is written even when `rows` is empty. Content is staged in
    /// a sibling `.tmp` file and renamed over the artifact, so readers only
    /// ever see a complete file.
    pub fn write<R: TableRow>(
        &self,
        table: &str,
        header: &[&str],
        rows: &[R],
    ) -> Result<WrittenArtifact, PipelineError> {
        let staged = self.stage(table, header, rows)?;
        commit_one(staged)
    }

    /// Write `rows` to the `.tmp` sibling of the artifact without replacing it.
    ///
    /// Dropping the returned [`StagedArtifact`] without committing it removes
    /// the temporary file.
    pub fn stage<R: TableRow>(
        &self,
        table: &str,
        header: &[&str],
        rows: &[R],
    ) -> Result<StagedArtifact, PipelineError> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.artifact_path(table);
        let tmp = self.data_dir.join(format!("{table}.csv.tmp"));

        if let Err(source) = write_rows(&tmp, header, rows) {
            let _ = fs::remove_file(&tmp);
            return Err(PipelineError::Artifact { path, source });
        }

        Ok(StagedArtifact {
            artifact: WrittenArtifact {
                table: table.to_string(),
                path,
                rows: rows.len(),
            },
            tmp,
            committed: false,
        })
    }

    /// Rename every staged file over its artifact.
    ///
    /// Called once all tables of a domain are staged, so a failure while
    /// writing any of them leaves every previous artifact in place.
    pub fn commit(&self, staged: Vec<StagedArtifact>) -> Result<Vec<WrittenArtifact>, PipelineError> {
        staged.into_iter().map(commit_one).collect()
    }
}

fn commit_one(mut staged: StagedArtifact) -> Result<WrittenArtifact, PipelineError> {
    fs::rename(&staged.tmp, &staged.artifact.path)?;
    staged.committed = true;
    debug!(
        table = %staged.artifact.table,
        rows = staged.artifact.rows,
        path = %staged.artifact.path.display(),
        "artifact written"
    );
    Ok(staged.artifact.clone())
}

/// A fully written temporary file awaiting [`TableWriter::commit`].
#[derive(Debug)]
pub struct StagedArtifact {
    artifact: WrittenArtifact,
    tmp: PathBuf,
    committed: bool,
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

fn write_rows<R: TableRow>(path: &Path, header: &[&str], rows: &[R]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Pair(&'static str, i64);

    impl TableRow for Pair {
        fn cells(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn header_is_written_for_empty_tables() {
        let temp = tempdir().expect("tempdir");
        let writer = TableWriter::new(temp.path().join("data"));

        let written = writer
            .write::<Pair>("empty", &["name", "value"], &[])
            .expect("write");

        assert_eq!(written.rows, 0);
        assert_eq!(
            fs::read_to_string(&written.path).expect("read"),
            "name,value\n"
        );
    }

    #[test]
    fn existing_artifact_is_replaced_and_no_tmp_file_remains() {
        let temp = tempdir().expect("tempdir");
        let writer = TableWriter::new(temp.path());
        writer
            .write("pairs", &["name", "value"], &[Pair("a", 1), Pair("b", 2)])
            .expect("first write");

        let written = writer
            .write("pairs", &["name", "value"], &[Pair("c, d", 3)])
            .expect("second write");

        assert_eq!(
            fs::read_to_string(&written.path).expect("read"),
            "name,value\n\"c, d\",3\n"
        );
        assert!(!temp.path().join("pairs.csv.tmp").exists());
    }

    #[test]
    fn failed_second_stage_leaves_both_artifacts_untouched() {
        let temp = tempdir().expect("tempdir");
        let writer = TableWriter::new(temp.path());
        writer
            .write("first", &["name", "value"], &[Pair("old", 1)])
            .expect("seed first");
        writer
            .write("second", &["name", "value"], &[Pair("old", 2)])
            .expect("seed second");
        fs::create_dir(temp.path().join("second.csv.tmp")).expect("blocker");

        let first = writer
            .stage("first", &["name", "value"], &[Pair("new", 1)])
            .expect("stage first");
        let second = writer.stage("second", &["name", "value"], &[Pair("new", 2)]);

        assert!(matches!(second, Err(PipelineError::Artifact { .. })));
        drop(first);
        assert_eq!(
            fs::read_to_string(temp.path().join("first.csv")).expect("read"),
            "name,value\nold,1\n"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("second.csv")).expect("read"),
            "name,value\nold,2\n"
        );
        assert!(!temp.path().join("first.csv.tmp").exists());
    }
}
