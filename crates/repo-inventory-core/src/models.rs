//! Core data models used throughout Repo Inventory.
//!
//! Every table the inventory produces is a `Vec` of one of the record types
//! below. Each record type has a fixed schema exposed through [`Record`], which
//! is what filter expressions are checked and evaluated against and what the
//! output renderers use for column headers.

use serde::{Deserialize, Serialize};

/// Column data type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Str,
    Int,
    Bool,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Str => "str",
            DataType::Int => "i64",
            DataType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A named, typed column in a record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub dtype: DataType,
}

impl Field {
    pub const fn new(name: &'static str, dtype: DataType) -> Self {
        Self { name, dtype }
    }
}

/// Ordered list of fields shared by every row of a table.
pub type Schema = &'static [Field];

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int),
            Value::Str(_) => Some(DataType::Str),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// A table row with a fixed schema.
pub trait Record {
    /// The schema shared by every row of this type.
    fn schema() -> Schema;

    /// Value of the named column, or `None` if the column does not exist.
    fn value(&self, column: &str) -> Option<Value>;

    /// All values in schema order.
    fn values(&self) -> Vec<Value> {
        Self::schema()
            .iter()
            .map(|f| self.value(f.name).unwrap_or(Value::Null))
            .collect()
    }
}

/// Metadata for one remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub default_branch: String,
    pub description: String,
    pub archived: bool,
    pub is_fork: bool,
    pub issues: i64,
    pub stars: i64,
    pub forks: i64,
    /// Size as reported by the remote service (KiB on GitHub).
    pub size: i64,
}

const REPOSITORY_SCHEMA: &[Field] = &[
    Field::new("name", DataType::Str),
    Field::new("default_branch", DataType::Str),
    Field::new("description", DataType::Str),
    Field::new("archived", DataType::Bool),
    Field::new("is_fork", DataType::Bool),
    Field::new("issues", DataType::Int),
    Field::new("stars", DataType::Int),
    Field::new("forks", DataType::Int),
    Field::new("size", DataType::Int),
];

impl Record for RepositoryRecord {
    fn schema() -> Schema {
        REPOSITORY_SCHEMA
    }

    fn value(&self, column: &str) -> Option<Value> {
        let v = match column {
            "name" => Value::Str(self.name.clone()),
            "default_branch" => Value::Str(self.default_branch.clone()),
            "description" => Value::Str(self.description.clone()),
            "archived" => Value::Bool(self.archived),
            "is_fork" => Value::Bool(self.is_fork),
            "issues" => Value::Int(self.issues),
            "stars" => Value::Int(self.stars),
            "forks" => Value::Int(self.forks),
            "size" => Value::Int(self.size),
            _ => return None,
        };
        Some(v)
    }
}

/// One path inside a repository tree at its default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntryRecord {
    pub repository_name: String,
    /// Path relative to the repository root, `/`-joined.
    pub file_path: String,
    pub is_directory: bool,
    /// Size reported at enumeration time; always 0 for directories.
    pub file_size_bytes: i64,
}

const FILE_ENTRY_SCHEMA: &[Field] = &[
    Field::new("repository_name", DataType::Str),
    Field::new("file_path", DataType::Str),
    Field::new("is_directory", DataType::Bool),
    Field::new("file_size_bytes", DataType::Int),
];

impl Record for FileEntryRecord {
    fn schema() -> Schema {
        FILE_ENTRY_SCHEMA
    }

    fn value(&self, column: &str) -> Option<Value> {
        let v = match column {
            "repository_name" => Value::Str(self.repository_name.clone()),
            "file_path" => Value::Str(self.file_path.clone()),
            "is_directory" => Value::Bool(self.is_directory),
            "file_size_bytes" => Value::Int(self.file_size_bytes),
            _ => return None,
        };
        Some(v)
    }
}

/// A [`FileEntryRecord`] together with the text it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentRecord {
    pub repository_name: String,
    pub file_path: String,
    pub is_directory: bool,
    pub file_size_bytes: i64,
    /// Empty for directories and for files whose read failed.
    pub content: String,
}

impl FileContentRecord {
    pub fn new(entry: FileEntryRecord, content: String) -> Self {
        Self {
            repository_name: entry.repository_name,
            file_path: entry.file_path,
            is_directory: entry.is_directory,
            file_size_bytes: entry.file_size_bytes,
            content,
        }
    }
}

const FILE_CONTENT_SCHEMA: &[Field] = &[
    Field::new("repository_name", DataType::Str),
    Field::new("file_path", DataType::Str),
    Field::new("is_directory", DataType::Bool),
    Field::new("file_size_bytes", DataType::Int),
    Field::new("content", DataType::Str),
];

impl Record for FileContentRecord {
    fn schema() -> Schema {
        FILE_CONTENT_SCHEMA
    }

    fn value(&self, column: &str) -> Option<Value> {
        let v = match column {
            "repository_name" => Value::Str(self.repository_name.clone()),
            "file_path" => Value::Str(self.file_path.clone()),
            "is_directory" => Value::Bool(self.is_directory),
            "file_size_bytes" => Value::Int(self.file_size_bytes),
            "content" => Value::Str(self.content.clone()),
            _ => return None,
        };
        Some(v)
    }
}

/// Look up a field by name in a schema.
pub fn field<'s>(schema: &'s [Field], name: &str) -> Option<&'s Field> {
    schema.iter().find(|f| f.name == name)
}
