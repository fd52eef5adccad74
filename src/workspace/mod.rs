//! Collaborator interfaces consumed by the core, with default
//! implementations
//!
//! The orchestrator talks to its host exclusively through these traits: a
//! project source, a destructive-action confirmer, a drag-and-drop path
//! resolver, an editor/browser opener, and a file picker. A host embedding
//! the library swaps in its own implementations; the defaults here are
//! enough for the standalone server binary.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::protocol::ProjectInfo;

/// Source of the project list pushed to the surface on handshake
pub trait ProjectSource: Send + Sync {
    fn list_projects(&self) -> Result<Vec<ProjectInfo>>;
}

/// Yes/no prompt consulted before destructive operations
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Resolves an opaque drag-and-drop payload into filesystem paths
pub trait DropResolver: Send + Sync {
    fn resolve_paths(&self, payload: &serde_json::Value) -> Vec<PathBuf>;
}

/// Opens files in the host's editor and URLs in the host's browser
pub trait Opener: Send + Sync {
    fn open_file(&self, path: &str, line: Option<u32>, column: Option<u32>);
    fn open_url(&self, url: &str);
}

/// Native file-picking dialog
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_files(&self) -> Vec<PathBuf>;
}

/// Lists the immediate subdirectories of a root as projects
pub struct DirectoryProjects {
    root: PathBuf,
}

impl DirectoryProjects {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ProjectSource for DirectoryProjects {
    fn list_projects(&self) -> Result<Vec<ProjectInfo>> {
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            projects.push(ProjectInfo {
                name,
                path: entry.path().to_string_lossy().into_owned(),
            });
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

/// Confirmer that always proceeds. The standalone binary has no prompt
/// surface; embedding hosts supply their own.
pub struct AutoConfirmer;

#[async_trait]
impl Confirmer for AutoConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        tracing::debug!("Auto-confirming: {}", message);
        true
    }
}

/// Resolves `text/uri-list` style payloads and plain path strings
///
/// Accepted payload shapes: a JSON string (one URI or path per line) or a
/// JSON array of such strings. Anything else resolves to no paths.
pub struct UriDropResolver {
    file_uri: Regex,
}

impl UriDropResolver {
    pub fn new() -> Self {
        Self {
            // Strip an optional localhost authority; the path keeps its
            // leading slash.
            file_uri: Regex::new(r"^file://(?:localhost)?(/[^\r\n]*)$").expect("static regex"),
        }
    }

    fn resolve_line(&self, line: &str) -> Option<PathBuf> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        if let Some(captures) = self.file_uri.captures(line) {
            return Some(PathBuf::from(percent_decode(&captures[1])));
        }
        if line.starts_with('/') {
            return Some(PathBuf::from(line));
        }
        None
    }
}

impl Default for UriDropResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DropResolver for UriDropResolver {
    fn resolve_paths(&self, payload: &serde_json::Value) -> Vec<PathBuf> {
        let texts: Vec<&str> = match payload {
            serde_json::Value::String(text) => vec![text.as_str()],
            serde_json::Value::Array(items) => {
                items.iter().filter_map(|item| item.as_str()).collect()
            }
            _ => Vec::new(),
        };

        texts
            .iter()
            .flat_map(|text| text.lines())
            .filter_map(|line| self.resolve_line(line))
            .collect()
    }
}

/// Opener that shells out to a configurable editor command and the
/// platform URL handler
pub struct CommandOpener {
    open_command: String,
}

impl CommandOpener {
    pub fn new(open_command: String) -> Self {
        Self { open_command }
    }
}

impl Opener for CommandOpener {
    fn open_file(&self, path: &str, line: Option<u32>, column: Option<u32>) {
        let command = self
            .open_command
            .replace("{path}", path)
            .replace("{line}", &line.unwrap_or(1).to_string())
            .replace("{column}", &column.unwrap_or(1).to_string());

        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return;
        };
        if let Err(e) = std::process::Command::new(program).args(parts).spawn() {
            tracing::warn!("Failed to open {} in editor: {}", path, e);
        }
    }

    fn open_url(&self, url: &str) {
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(target_os = "macos"))]
        let program = "xdg-open";

        if let Err(e) = std::process::Command::new(program).arg(url).spawn() {
            tracing::warn!("Failed to open URL {}: {}", url, e);
        }
    }
}

/// Picker for hosts without a native dialog; always picks nothing
pub struct NoopFilePicker;

#[async_trait]
impl FilePicker for NoopFilePicker {
    async fn pick_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Quote a path for insertion into a shell command line
pub fn shell_quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphanumeric() || b"/._-".contains(&b)) {
        return text.into_owned();
    }
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Decode %XX escapes; malformed escapes pass through untouched
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_uri_list_payload() {
        let resolver = UriDropResolver::new();
        let payload = json!("file:///home/user/project%20one\nfile://localhost/tmp/file.rs\n# comment\n");
        let paths = resolver.resolve_paths(&payload);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/home/user/project one"),
                PathBuf::from("/tmp/file.rs")
            ]
        );
    }

    #[test]
    fn resolves_plain_paths_and_arrays() {
        let resolver = UriDropResolver::new();
        let payload = json!(["/var/log/syslog", "file:///etc/hosts", "not-a-path"]);
        let paths = resolver.resolve_paths(&payload);
        assert_eq!(
            paths,
            vec![PathBuf::from("/var/log/syslog"), PathBuf::from("/etc/hosts")]
        );
    }

    #[test]
    fn non_text_payload_resolves_to_nothing() {
        let resolver = UriDropResolver::new();
        assert!(resolver.resolve_paths(&json!(42)).is_empty());
        assert!(resolver.resolve_paths(&json!({"kind": "unknown"})).is_empty());
    }

    #[test]
    fn percent_decoding_handles_malformed_escapes() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn shell_quote_wraps_special_characters() {
        assert_eq!(shell_quote(Path::new("/plain/path.rs")), "/plain/path.rs");
        assert_eq!(shell_quote(Path::new("/with space")), "'/with space'");
        assert_eq!(shell_quote(Path::new("/it's")), r"'/it'\''s'");
    }

    #[test]
    fn directory_projects_lists_sorted_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("beta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join("not-a-dir"), b"x").unwrap();

        let source = DirectoryProjects::new(dir.path().to_path_buf());
        let projects = source.list_projects().unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
