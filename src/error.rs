use thiserror::Error;

/// I/O errors raised by image backends and the local filesystem
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading from a file or directory failed
    #[error("Read error for {path}: {message}")]
    Read { path: String, message: String },

    /// File content could not be interpreted
    #[error("Parse error for {path}: {message}")]
    Parse { path: String, message: String },

    /// Writing to a file or directory failed
    #[error("Write error for {path}: {message}")]
    Write { path: String, message: String },

    /// The backend cannot open this kind of file (should map to "unsupported")
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

impl IoError {
    /// Map a `std::io::Error` for `path` into an [`IoError`].
    pub fn from_std(path: impl AsRef<str>, err: std::io::Error) -> Self {
        let path = path.as_ref().to_string();
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path)
        } else {
            IoError::Read {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Errors raised while expanding a file name pattern into paths
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Pattern matched zero files
    #[error("No files match '{pattern}' in {directory}")]
    NoMatch { pattern: String, directory: String },

    /// Pattern is not a valid regular expression
    #[error("Invalid file name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Path mapping is not of the form `from,to`
    #[error("Invalid path mapping '{0}': expected 'from,to'")]
    InvalidPathMapping(String),

    /// Directory listing failed
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised while reading metadata from a representative image
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The image could not be opened by the backend
    #[error("Cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: IoError,
    },

    /// The backend returned an image without resolution levels
    #[error("Image {0} has no resolution levels")]
    NoLevels(String),

    /// Requested channel does not exist in the image
    #[error("Channel {channel} out of range for {path} ({num_channels} channel(s))")]
    ChannelOutOfRange {
        path: String,
        channel: u32,
        num_channels: u32,
    },
}

/// Errors raised by annotation and region tables
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// Column does not exist
    #[error("Missing column '{column}' in table {table}")]
    MissingColumn { table: String, column: String },

    /// A cell that must be numeric is not
    #[error("Column '{column}' row {row} is not numeric: '{value}'")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },

    /// Row index past the end of the table
    #[error("Row {row} out of range for table {table} ({rows} row(s))")]
    RowOutOfRange {
        table: String,
        row: usize,
        rows: usize,
    },

    /// Table has no header or no rows where rows are required
    #[error("Table {0} is empty")]
    Empty(String),

    /// Column length does not match the table
    #[error("Column '{column}' has {actual} value(s), table has {expected} row(s)")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// I/O error while reading or writing the table
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised while constructing a source group
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// File pattern did not resolve
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Metadata of the representative file could not be read
    #[error("Metadata probe failure: {0}")]
    Probe(#[from] ProbeError),

    /// Annotation table could not be read
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Table column produced zero images
    #[error("Group '{group}' has no images in column '{column}'")]
    Empty { group: String, column: String },
}

/// Errors raised while composing grid views
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// Grid type is not one of the known layouts
    #[error("Grid type not supported: {0}")]
    UnsupportedGridType(String),

    /// Region table has fewer rows than a group has members
    #[error("Region table {table} has no row {row} for group '{group}'")]
    MissingRegionRow {
        table: String,
        group: String,
        row: usize,
    },

    /// Nothing to compose
    #[error("No source groups to compose")]
    NoSources,

    /// Region table column missing or malformed
    #[error("Region table error: {0}")]
    Table(#[from] TableError),
}

/// Errors raised while assembling, persisting or materializing datasets
#[derive(Debug, Clone, Error)]
pub enum DatasetError {
    /// A multi-slice source was added to a dataset locked as 2-D
    #[error("Cannot add 3-D source '{source_name}' ({num_z_slices} z-slices) to 2-D dataset")]
    DimensionalityConflict {
        source_name: String,
        num_z_slices: u32,
    },

    /// Source name already registered in the dataset
    #[error("Duplicate source name: {0}")]
    DuplicateSource(String),

    /// Source name not registered in the dataset
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// View name not registered in the dataset
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Data source has no location for its image data
    #[error("Source '{0}' has no image data")]
    MissingImageData(String),

    /// Grid composition failed
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    /// Table could not be written
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Image could not be opened while materializing a view
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        DatasetError::Json(err.to_string())
    }
}
