use keysnip_core::{Result, Snippet};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Load snippets from a JSON array of `{id, command, content}`.
///
/// A missing or empty file yields no snippets.
pub fn load_snippets(path: &Path) -> Result<Vec<Snippet>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Snippet file not found");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Commands defined more than once, in first-seen order.
pub fn duplicate_commands(snippets: &[Snippet]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = Vec::new();
    for snippet in snippets {
        let count = seen.entry(snippet.command.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 && !snippet.command.is_empty() {
            duplicates.push(snippet.command.clone());
        }
    }
    duplicates
}

/// Reloads the snippet file when its modification time changes.
#[derive(Debug)]
pub struct SnippetWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    loaded: bool,
}

impl SnippetWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_modified: None,
            loaded: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The new snippet set if the file changed since the last poll. The
    /// first poll always loads.
    pub fn poll(&mut self) -> Result<Option<Vec<Snippet>>> {
        let modified = match fs::metadata(&self.path) {
            Ok(metadata) => Some(metadata.modified()?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        if self.loaded && modified == self.last_modified {
            return Ok(None);
        }

        let snippets = load_snippets(&self.path)?;
        self.loaded = true;
        self.last_modified = modified;
        Ok(Some(snippets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const SNIPPETS: &str = r#"[
        {"id": "1", "command": "btw", "content": "by the way"},
        {"id": "2", "command": "sig", "content": "Regards, {{name}}"}
    ]"#;

    #[test]
    fn test_load_snippets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snippets.json");
        fs::write(&path, SNIPPETS).unwrap();

        let snippets = load_snippets(&path).unwrap();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[1], Snippet::new("2", "sig", "Regards, {{name}}"));
    }

    #[test]
    fn test_missing_or_empty_file_has_no_snippets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snippets.json");
        assert!(load_snippets(&path).unwrap().is_empty());

        fs::write(&path, "  \n").unwrap();
        assert!(load_snippets(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snippets.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_snippets(&path).is_err());
    }

    #[test]
    fn test_duplicate_commands() {
        let snippets = vec![
            Snippet::new("1", "btw", "a"),
            Snippet::new("2", "omw", "b"),
            Snippet::new("3", "btw", "c"),
            Snippet::new("4", "btw", "d"),
        ];
        assert_eq!(duplicate_commands(&snippets), vec!["btw".to_string()]);
    }

    #[test]
    fn test_watcher_reloads_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snippets.json");
        fs::write(&path, SNIPPETS).unwrap();

        let mut watcher = SnippetWatcher::new(path.clone());
        assert_eq!(watcher.poll().unwrap().map(|s| s.len()), Some(2));
        assert!(watcher.poll().unwrap().is_none());

        fs::write(&path, r#"[{"id": "9", "command": "x", "content": "y"}]"#).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        let reloaded = watcher.poll().unwrap().expect("reloaded");
        assert_eq!(reloaded, vec![Snippet::new("9", "x", "y")]);
    }

    #[test]
    fn test_watcher_first_poll_of_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut watcher = SnippetWatcher::new(dir.path().join("absent.json"));
        assert_eq!(watcher.poll().unwrap(), Some(Vec::new()));
        assert!(watcher.poll().unwrap().is_none());
    }
}
