//! OneDrive service implementations.
//!
//! Items live in the application folder (`/me/drive/special/approot`) and are
//! addressed by name.

mod files;
mod upload;

pub use files::*;
pub use upload::*;

use crate::errors::{OneDriveError, OneDriveResult, RequestError, ResponseError};
use crate::types::DriveItem;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Path of the application folder.
pub const APP_FOLDER_PATH: &str = "me/drive/special/approot";

/// Characters escaped in an item name used as a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Path addressing `name` inside the application folder.
pub(crate) fn item_path(name: &str) -> OneDriveResult<String> {
    if name.trim().is_empty() {
        return Err(RequestError::MissingParameter("file name".to_string()).into());
    }
    Ok(format!(
        "{}:/{}:",
        APP_FOLDER_PATH,
        utf8_percent_encode(name, PATH_SEGMENT)
    ))
}

/// Checksum reported for an uploaded item.
pub(crate) fn checksum_of(item: &DriveItem) -> OneDriveResult<String> {
    item.checksum().map(str::to_string).ok_or_else(|| {
        OneDriveError::Response(ResponseError::MissingField(
            "file.hashes.sha1Hash or file.hashes.quickXorHash".to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_path() {
        assert_eq!(
            item_path("notes.txt").unwrap(),
            "me/drive/special/approot:/notes.txt:"
        );
        assert_eq!(
            item_path("a b#c.txt").unwrap(),
            "me/drive/special/approot:/a%20b%23c.txt:"
        );
        assert!(item_path("  ").is_err());
    }
}
