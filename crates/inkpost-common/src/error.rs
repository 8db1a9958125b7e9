use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// The tracking table could not be created, read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("migration {id}_{name} failed: {reason}")]
    UnitApplyFailed {
        id: String,
        name: String,
        reason: String,
    },

    #[error("failed to revert migration {id}_{name}: {reason}")]
    UnitRevertFailed {
        id: String,
        name: String,
        reason: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("seeder error: {0}")]
    Seed(String),
}

impl Error {
    /// Id of the migration unit this error is about, if any.
    pub fn unit_id(&self) -> Option<&str> {
        match self {
            Error::UnitApplyFailed { id, .. } | Error::UnitRevertFailed { id, .. } => Some(id),
            _ => None,
        }
    }
}
