pub mod error;
pub mod lock_utils;

pub use error::{MvpTreeError, Result};

#[cfg(test)]
mod tests {
    mod error_tests;
}
