//! Coprocessor errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoproError {
    #[error("register {reg} holds an element with no inverse modulo register {modulus}")]
    NonInvertibleElement { reg: usize, modulus: usize },
}
