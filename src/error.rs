use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Migration file is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Column {column} could not be read as text: {reason}")]
    UnreadableColumn { column: String, reason: String },
}
