// src/core/config.rs

use crate::core::common::MvpTreeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Default number of partitions per vantage point.
pub const DEFAULT_BRANCH_FACTOR: usize = 2;
/// Default number of ancestor distances cached per point.
pub const DEFAULT_PATH_LENGTH: usize = 5;
/// Default maximum number of points held by a leaf before it splits.
pub const DEFAULT_LEAF_CAPACITY: usize = 25;

/// Largest accepted branch factor. An internal node addresses up to
/// `branch_factor^(branch_factor - 1)` children, which must fit in a `u64`.
pub const MAX_BRANCH_FACTOR: usize = 16;
/// Largest accepted path length.
pub const MAX_PATH_LENGTH: usize = 1024;

/// Shape parameters of an MVP tree.
///
/// Fixed for the lifetime of a tree: set at construction, or read back from the
/// persisted header when a tree is loaded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct TreeConfig {
    pub branch_factor: usize,
    pub path_length: usize,
    pub leaf_capacity: usize,
}

/// Builder for [`TreeConfig`]. Unset values fall back to the defaults.
#[derive(Debug, Clone, Default)]
pub struct TreeConfigBuilder {
    branch_factor: Option<usize>,
    path_length: Option<usize>,
    leaf_capacity: Option<usize>,
}

impl TreeConfigBuilder {
    /// Creates a new TreeConfigBuilder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the branch factor
    pub fn branch_factor(mut self, branch_factor: usize) -> Self {
        self.branch_factor = Some(branch_factor);
        self
    }

    /// Sets the path length
    pub fn path_length(mut self, path_length: usize) -> Self {
        self.path_length = Some(path_length);
        self
    }

    /// Sets the leaf capacity
    pub fn leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = Some(leaf_capacity);
        self
    }

    /// Builds the TreeConfig instance with validation
    pub fn build(self) -> Result<TreeConfig, MvpTreeError> {
        let config = TreeConfig {
            branch_factor: self.branch_factor.unwrap_or(DEFAULT_BRANCH_FACTOR),
            path_length: self.path_length.unwrap_or(DEFAULT_PATH_LENGTH),
            leaf_capacity: self.leaf_capacity.unwrap_or(DEFAULT_LEAF_CAPACITY),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            branch_factor: DEFAULT_BRANCH_FACTOR,
            path_length: DEFAULT_PATH_LENGTH,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
        }
    }
}

impl fmt::Display for TreeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "branch_factor={}, path_length={}, leaf_capacity={}",
            self.branch_factor, self.path_length, self.leaf_capacity
        )
    }
}

impl TreeConfig {
    /// Creates a validated configuration.
    pub fn new(
        branch_factor: usize,
        path_length: usize,
        leaf_capacity: usize,
    ) -> Result<Self, MvpTreeError> {
        let config = Self { branch_factor, path_length, leaf_capacity };
        config.validate()?;
        Ok(config)
    }

    /// Creates a new TreeConfigBuilder for fluent configuration
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::new()
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), MvpTreeError> {
        if !(2..=MAX_BRANCH_FACTOR).contains(&self.branch_factor) {
            return Err(MvpTreeError::InvalidArgument(format!(
                "branch_factor must be between 2 and {}, got {}",
                MAX_BRANCH_FACTOR, self.branch_factor
            )));
        }

        if !(1..=MAX_PATH_LENGTH).contains(&self.path_length) {
            return Err(MvpTreeError::InvalidArgument(format!(
                "path_length must be between 1 and {}, got {}",
                MAX_PATH_LENGTH, self.path_length
            )));
        }

        if self.leaf_capacity == 0 {
            return Err(MvpTreeError::InvalidArgument(
                "leaf_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Maximum number of vantage points held by one internal node.
    pub fn max_vantage_points(&self) -> usize {
        self.branch_factor - 1
    }

    /// Number of children addressed by an internal node with `vantage_points`
    /// vantage points, or `None` if it does not fit in a `u64`.
    pub fn fanout(&self, vantage_points: usize) -> Option<u64> {
        let exponent = u32::try_from(vantage_points).ok()?;
        (self.branch_factor as u64).checked_pow(exponent)
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(contents: &str) -> Result<Self, MvpTreeError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, MvpTreeError> {
        Ok(toml::to_string(self)?)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `MvpTreeError::Io` if the file cannot be read and
    /// `MvpTreeError::Config` if parsing fails.
    pub fn load_from_file(path: &Path) -> Result<Self, MvpTreeError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            MvpTreeError::Config(msg) => MvpTreeError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }
}
