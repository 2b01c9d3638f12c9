//! Request URL construction
//!
//! Pure functions assembling Graph request URLs from the drive prefix, the
//! resolved root path and remote file names, with slash normalization.

use crate::resolver::DrivePrefix;

/// Graph service origin
pub const BASE_URL: &str = "https://graph.microsoft.com";

/// Graph API version prefix
pub const API_VERSION: &str = "/v1.0";

/// Normalize a user-supplied path fragment.
///
/// Backslashes become forward slashes, a leading slash is ensured for
/// non-empty input, and trailing slashes are stripped. The empty string
/// normalizes to the empty string.
pub fn normalize_slashes(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");

    while normalized.ends_with('/') {
        normalized.pop();
    }

    if !normalized.is_empty() && !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }

    normalized
}

/// Percent-encode each segment of a slash-separated path, keeping the
/// separators intact.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// URL builder bound to a resolved drive prefix.
#[derive(Debug, Clone)]
pub struct DriveUrls {
    drive_url: String,
    root_path: String,
}

impl DriveUrls {
    pub fn new(prefix: &DrivePrefix) -> Self {
        Self {
            drive_url: format!("{}{}{}", BASE_URL, prefix.api_version, prefix.drive_path),
            root_path: prefix.root_path.clone(),
        }
    }

    /// The resolved root path, slash-normalized
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// `{base}{apiVersion}{drivePath}`, the drive resource itself
    pub fn drive_url(&self) -> String {
        self.drive_url.clone()
    }

    /// The drive's root folder item (`…/root`), ignoring the root path
    pub fn drive_root_url(&self) -> String {
        format!("{}/root", self.drive_url)
    }

    /// Metadata URL for the backup root folder
    pub fn root_item_url(&self) -> String {
        if self.root_path.is_empty() {
            self.drive_root_url()
        } else {
            format!("{}/root:{}", self.drive_url, encode_path(&self.root_path))
        }
    }

    /// Metadata URL for an item prefix path under the drive root
    pub fn item_by_path_url(&self, path: &str) -> String {
        format!("{}/root:{}", self.drive_url, encode_path(path))
    }

    /// Metadata URL for a named file under the backup root
    pub fn item_url(&self, name: &str) -> String {
        format!(
            "{}/root:{}{}",
            self.drive_url,
            encode_path(&self.root_path),
            encode_path(&normalize_slashes(name))
        )
    }

    /// `{item}:/{verb}` for `content`, `children` or `createUploadSession`
    pub fn verb_url(&self, name: &str, verb: &str) -> String {
        format!("{}:/{}", self.item_url(name), verb)
    }

    /// Children listing URL for the backup root folder
    pub fn children_url(&self) -> String {
        if self.root_path.is_empty() {
            format!("{}/children", self.drive_root_url())
        } else {
            format!("{}:/children", self.root_item_url())
        }
    }

    /// Children collection of a known parent item
    pub fn children_of_item_url(&self, parent_id: &str) -> String {
        format!("{}/items/{}/children", self.drive_url, parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(root_path: &str) -> DrivePrefix {
        DrivePrefix {
            api_version: API_VERSION.to_string(),
            drive_path: "/me/drive".to_string(),
            root_path: root_path.to_string(),
        }
    }

    #[test]
    fn test_normalize_slashes() {
        assert_eq!(normalize_slashes(""), "");
        assert_eq!(normalize_slashes("/"), "");
        assert_eq!(normalize_slashes("backup"), "/backup");
        assert_eq!(normalize_slashes("backup/photos/"), "/backup/photos");
        assert_eq!(normalize_slashes("backup\\photos"), "/backup/photos");
        assert_eq!(normalize_slashes("/backup"), "/backup");
    }

    #[test]
    fn test_item_and_verb_urls() {
        let urls = DriveUrls::new(&prefix("/backup"));
        assert_eq!(
            urls.item_url("a.bin"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/backup/a.bin"
        );
        assert_eq!(
            urls.verb_url("a.bin", "content"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/backup/a.bin:/content"
        );
        assert_eq!(
            urls.verb_url("big.bin", "createUploadSession"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/backup/big.bin:/createUploadSession"
        );
    }

    #[test]
    fn test_children_urls() {
        let urls = DriveUrls::new(&prefix("/backup"));
        assert_eq!(
            urls.children_url(),
            "https://graph.microsoft.com/v1.0/me/drive/root:/backup:/children"
        );

        let root = DriveUrls::new(&prefix(""));
        assert_eq!(
            root.children_url(),
            "https://graph.microsoft.com/v1.0/me/drive/root/children"
        );
    }

    #[test]
    fn test_children_of_item_url() {
        let urls = DriveUrls::new(&prefix("/backup"));
        assert_eq!(
            urls.children_of_item_url("item42"),
            "https://graph.microsoft.com/v1.0/me/drive/items/item42/children"
        );
    }

    #[test]
    fn test_names_are_percent_encoded() {
        let urls = DriveUrls::new(&prefix("/backup"));
        assert_eq!(
            urls.item_url("a b.bin"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/backup/a%20b.bin"
        );
    }
}
