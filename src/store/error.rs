use thiserror::Error;

use super::model::Fragment;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Team or fragment absent. Carries what was looked up ("Team", "Fragment").
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Fragment re-submission. Nothing was changed; carries the stored state.
    #[error("Fragment already solved")]
    AlreadyCompleted {
        team_id: String,
        team_solved: bool,
        index: usize,
        fragment: Fragment,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
