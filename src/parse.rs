//! Helper functions to interpret string inputs.

use crate::error::Error;
use std::ffi::OsString;
use std::{fs::DirEntry, path::Path};

/// Splits a comma-separated list of field names, such as `dens,entr,ye`.
/// Surrounding whitespace is trimmed, and a name may appear only once.
pub fn parse_field_list(string: &str) -> Result<Vec<String>, Error> {
    let mut fields: Vec<String> = Vec::new();
    for name in string.split(',').map(str::trim) {
        if name.is_empty() {
            return Err(Error::CommandLineParse(format!(
                "empty name in field list '{}'",
                string
            )));
        }
        if fields.iter().any(|f| f == name) {
            return Err(Error::CommandLineParse(format!(
                "field {} is listed more than once",
                name
            )));
        }
        fields.push(name.to_owned());
    }
    Ok(fields)
}

/// Returns the parent directory for an absolute path string, or `None` if no
/// parent directory exists. If the path is relative this function returns
/// `Some(".")`.
pub fn parent_dir(path: &str) -> Option<&str> {
    Path::new(path)
        .parent()
        .and_then(Path::to_str)
        .map(|s| if s.is_empty() { "." } else { s })
}

/// Attempts to interpret the given string as a directory and read its
/// contents. If that succeeds, then returns the path of the last entry in the
/// directory, sorted alphabetically, which ends with `extension`. If no
/// matching files are found or if `dir` was not a directory, then returns
/// `None`.
pub fn last_in_dir_ending_with(dir: &str, extension: &str) -> Option<String> {
    let mut entries = std::fs::read_dir(dir)
        .ok()?
        .collect::<Result<Vec<DirEntry>, _>>()
        .ok()?;
    entries.retain(|e| {
        e.file_name()
            .to_str()
            .map_or(false, |name| name.ends_with(extension))
    });
    entries.sort_by_key(DirEntry::file_name);
    entries
        .last()
        .map(DirEntry::path)
        .map(|p| p.into_os_string())
        .and_then(|p: OsString| p.into_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lists_are_comma_separated() {
        assert_eq!(parse_field_list("dens").unwrap(), vec!["dens"]);
        assert_eq!(parse_field_list("dens, entr,ye").unwrap(), vec!["dens", "entr", "ye"]);
        assert!(parse_field_list("dens,,entr").is_err());
        assert!(parse_field_list("dens,dens").is_err());
        assert!(parse_field_list("").is_err());
    }

    #[test]
    fn parent_dir_of_relative_path_is_current_dir() {
        assert_eq!(parent_dir("chkpt.0000.ccsn"), Some("."));
        assert_eq!(parent_dir("data/chkpt.0000.ccsn"), Some("data"));
        assert_eq!(parent_dir("/"), None);
    }
}
