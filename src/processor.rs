//! Document processor.
//!
//! Turns a document root into chunked [`Document`]s. Three fixed
//! sub-directories are read, each with its own extraction rule:
//!
//! | Directory  | Files            | One document per            | `type`                |
//! |------------|------------------|-----------------------------|-----------------------|
//! | `jql/`     | `*.txt`, `*.md`  | file (verbatim)             | `jql_cheatsheet`      |
//! | `fields/`  | `*.json`         | field record in the array   | `field_documentation` |
//! | `history/` | `*.csv`          | (project, issue_type, priority) group | `historical_summary` |
//!
//! A missing sub-directory contributes nothing. A file that cannot be
//! read or parsed aborts processing with a [`ProcessError`].
//!
//! Only direct children are read and they are visited in file-name
//! order, so the output is deterministic for a given tree.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::chunk::TextSplitter;
use crate::error::ProcessError;
use crate::models::{DocType, Document, Metadata};

pub const CHEATSHEET_DIR: &str = "jql";
pub const FIELDS_DIR: &str = "fields";
pub const HISTORY_DIR: &str = "history";

/// Summaries kept per history group.
const MAX_EXAMPLE_SUMMARIES: usize = 5;
const SUMMARY_SEPARATOR: &str = " || ";
const HISTORY_COLUMNS: [&str; 5] = ["project", "issue_type", "priority", "summary", "count"];

#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// Extract every category under `root` and chunk the combined result.
    pub fn process(&self, root: &Path) -> Result<Vec<Document>> {
        let mut documents = load_cheatsheets(&root.join(CHEATSHEET_DIR))?;
        let cheatsheets = documents.len();

        let fields = load_field_docs(&root.join(FIELDS_DIR))?;
        let field_count = fields.len();
        documents.extend(fields);

        let history = load_history(&root.join(HISTORY_DIR))?;
        let history_count = history.len();
        documents.extend(history);

        let chunks = self.splitter.split_documents(&documents);
        info!(
            root = %root.display(),
            cheatsheets,
            fields = field_count,
            history = history_count,
            chunks = chunks.len(),
            "processed document root"
        );
        Ok(chunks)
    }
}

/// Direct children of `dir` whose extension is one of `extensions`,
/// sorted by file name. A missing directory yields an empty list.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "directory not present, skipping");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn read_file(path: &Path) -> Result<String, ProcessError> {
    std::fs::read_to_string(path).map_err(|source| ProcessError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ============ Cheat sheets ============

/// Every `.txt` / `.md` file becomes one document, content verbatim.
pub fn load_cheatsheets(dir: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in list_files(dir, &["txt", "md"])? {
        let content = read_file(&path)?;
        documents.push(Document::new(
            content,
            Metadata::new(file_name(&path), DocType::JqlCheatsheet),
        ));
    }
    Ok(documents)
}

// ============ Field documentation ============

/// One entry of a `fields/*.json` array. Every attribute is optional;
/// `null` is treated the same as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub searchable: Option<bool>,
    #[serde(default)]
    pub operators: Option<Vec<String>>,
}

impl FieldRecord {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn render(&self) -> String {
        let searchable = if self.searchable.unwrap_or(false) {
            "True"
        } else {
            "False"
        };
        let operators = self
            .operators
            .as_deref()
            .map(|ops| ops.join(", "))
            .unwrap_or_default();
        format!(
            "Field Name: {}\nField Type: {}\nDescription: {}\nSearchable: {}\nOperators: {}",
            self.name(),
            self.field_type.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            searchable,
            operators
        )
    }
}

/// Every record of every `.json` array becomes one document.
pub fn load_field_docs(dir: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in list_files(dir, &["json"])? {
        let raw = read_file(&path)?;
        let records: Vec<FieldRecord> =
            serde_json::from_str(&raw).map_err(|source| ProcessError::Json {
                path: path.display().to_string(),
                source,
            })?;
        let source = file_name(&path);
        for record in records {
            documents.push(Document::new(
                record.render(),
                Metadata::new(source.clone(), DocType::FieldDocumentation)
                    .with("field_name", record.name()),
            ));
        }
    }
    Ok(documents)
}

// ============ History ============

#[derive(Debug, Default)]
struct HistoryGroup {
    summaries: Vec<String>,
    count: usize,
}

/// One document per `(project, issue_type, priority)` group of each
/// `.csv` file, groups in sorted key order.
pub fn load_history(dir: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in list_files(dir, &["csv"])? {
        let source = file_name(&path);
        for ((project, issue_type, priority), group) in group_history(&path)? {
            let content = format!(
                "Project: {}\nIssue Type: {}\nPriority: {}\nCommon Patterns:\n{}\nFrequency: {} occurrences",
                project,
                issue_type,
                priority,
                group.summaries.join(SUMMARY_SEPARATOR),
                group.count
            );
            documents.push(Document::new(
                content,
                Metadata::new(source.clone(), DocType::HistoricalSummary)
                    .with("project", project)
                    .with("issue_type", issue_type),
            ));
        }
    }
    Ok(documents)
}

type GroupKey = (String, String, String);

fn group_history(path: &Path) -> Result<BTreeMap<GroupKey, HistoryGroup>, ProcessError> {
    let csv_err = |source: csv::Error| ProcessError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut columns = [0usize; HISTORY_COLUMNS.len()];
    for (slot, name) in columns.iter_mut().zip(HISTORY_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ProcessError::MissingColumn {
                path: path.display().to_string(),
                column: name.to_string(),
            })?;
    }
    let [project_col, type_col, priority_col, summary_col, count_col] = columns;

    let mut groups: BTreeMap<GroupKey, HistoryGroup> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let cell = |i: usize| record.get(i).unwrap_or_default();

        let key = (
            cell(project_col).to_string(),
            cell(type_col).to_string(),
            cell(priority_col).to_string(),
        );
        if key.0.is_empty() || key.1.is_empty() || key.2.is_empty() {
            continue;
        }

        let group = groups.entry(key).or_default();
        let summary = cell(summary_col);
        if !summary.is_empty() && group.summaries.len() < MAX_EXAMPLE_SUMMARIES {
            group.summaries.push(summary.to_string());
        }
        if !cell(count_col).is_empty() {
            group.count += 1;
        }
    }
    Ok(groups)
}
