use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebHostError {
    #[error("no global window object")]
    NoWindow,

    #[error("window has no document")]
    NoDocument,
}
