//! Lock error handling utilities
//!
//! Poisoned `RwLock`s are surfaced as recoverable `MvpTreeError::Lock` values.

use crate::core::common::MvpTreeError;
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

/// Convert a poisoned read lock error to MvpTreeError
pub fn read_lock_poisoned<T>(_: PoisonError<RwLockReadGuard<'_, T>>) -> MvpTreeError {
    MvpTreeError::Lock("Failed to acquire read lock".to_string())
}

/// Convert a poisoned write lock error with context
pub fn write_lock_poisoned_with_context<T>(
    context: &str,
) -> impl Fn(PoisonError<RwLockWriteGuard<'_, T>>) -> MvpTreeError + '_ {
    move |_| MvpTreeError::Lock(format!("Failed to acquire write lock: {}", context))
}
