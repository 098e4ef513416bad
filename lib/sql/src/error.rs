use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),
}
