//! CLI Error Types
//!
//! Every command failure ends up here so that `main` can print one error
//! tree and exit non-zero.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unable to find backups")]
    Discovery,
    #[display("unable to read manifest")]
    Manifest,
    #[display("rebuild failed")]
    Rebuild,
    #[display("unable to write output")]
    Output,
}
