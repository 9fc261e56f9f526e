use std::path::{Component, Path};

use crate::StoreError;

/// Validates that an upload name is usable as a single file name under
/// the store root.
///
/// Rejects:
/// - Empty names
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - `.` and `..`
/// - Anything with more than one path component
pub fn validate_file_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty name".into()));
    }
    if name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) | (Some(Component::CurDir), _) => Err(
            StoreError::InvalidName(format!("relative directory not allowed: {name}")),
        ),
        (Some(Component::Prefix(_)), _) | (Some(Component::RootDir), _) => Err(
            StoreError::InvalidName(format!("absolute path not allowed: {name}")),
        ),
        _ => Err(StoreError::InvalidName(format!(
            "expected a single file name: {name}"
        ))),
    }
}
