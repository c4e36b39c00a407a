//! In-memory filesystem
//!
//! Lists entries in insertion order, which makes it possible to replay a
//! recycle store captured elsewhere and to check the report's ordering
//! without depending on the host's directory order.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{entry_name, DirIdentity, DirectoryEntry, FileSystem, Listing, NamePattern};
use crate::time::FileTime;

#[derive(Debug, Clone)]
enum NodeKind {
    File(Vec<u8>),
    Directory,
    /// Directory alias (junction) resolved when a path is looked up
    Link(PathBuf),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    hidden: bool,
    created_at: Option<FileTime>,
    modified_at: Option<FileTime>,
    accessed_at: Option<FileTime>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            hidden: false,
            created_at: None,
            modified_at: None,
            accessed_at: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    nodes: HashMap<PathBuf, Node>,
    /// Child names per directory, in insertion order
    children: HashMap<PathBuf, Vec<String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and any missing parents
    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(path, NodeKind::Directory);
        self
    }

    /// Create or replace a file, creating missing parents
    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(path, NodeKind::File(contents.into()));
        self
    }

    /// Create a directory entry that resolves to `target`
    pub fn add_dir_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(path, NodeKind::Link(normalize(target.as_ref())));
        self
    }

    pub fn set_times(
        &mut self,
        path: impl AsRef<Path>,
        created: FileTime,
        modified: FileTime,
        accessed: FileTime,
    ) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&normalize(path.as_ref())) {
            node.created_at = Some(created);
            node.modified_at = Some(modified);
            node.accessed_at = Some(accessed);
        }
        self
    }

    pub fn set_hidden(&mut self, path: impl AsRef<Path>, hidden: bool) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&normalize(path.as_ref())) {
            node.hidden = hidden;
        }
        self
    }

    fn insert(&mut self, path: PathBuf, kind: NodeKind) {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.nodes.contains_key(parent) {
                self.insert(parent.to_path_buf(), NodeKind::Directory);
            }
            let siblings = self.children.entry(parent.to_path_buf()).or_default();
            let name = entry_name(&path);
            if !siblings.contains(&name) {
                siblings.push(name);
            }
        }
        match self.nodes.get_mut(&path) {
            Some(node) => node.kind = kind,
            None => {
                self.nodes.insert(path, Node::new(kind));
            }
        }
    }

    /// Follow links component by component
    fn resolve(&self, path: &Path) -> PathBuf {
        let mut resolved = PathBuf::new();
        let mut seen = HashSet::new();
        for component in normalize(path).components() {
            resolved.push(component);
            while let Some(Node {
                kind: NodeKind::Link(target),
                ..
            }) = self.nodes.get(&resolved)
            {
                if !seen.insert(resolved.clone()) {
                    break;
                }
                resolved = target.clone();
            }
        }
        resolved
    }

    fn describe(&self, name: String, node: &Node) -> DirectoryEntry {
        let (is_directory, size) = match &node.kind {
            NodeKind::File(data) => (false, data.len() as u64),
            NodeKind::Directory | NodeKind::Link(_) => (true, 0),
        };
        DirectoryEntry {
            file_name: name.clone().into(),
            name,
            is_directory,
            is_hidden: node.hidden,
            size,
            created_at: node.created_at,
            modified_at: node.modified_at,
            accessed_at: node.accessed_at,
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn list(&self, dir: &Path, pattern: &NamePattern) -> io::Result<Listing<'_>> {
        let dir = self.resolve(dir);
        let is_dir = dir.as_os_str().is_empty()
            || matches!(
                self.nodes.get(&dir).map(|node| &node.kind),
                Some(NodeKind::Directory)
            );
        if !is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            ));
        }

        let names = self.children.get(&dir).cloned().unwrap_or_default();
        let pattern = pattern.clone();
        Ok(Box::new(names.into_iter().filter_map(move |name| {
            if !pattern.matches(&name) {
                return None;
            }
            let node = self.nodes.get(&dir.join(&name))?;
            Some(Ok(self.describe(name, node)))
        })))
    }

    fn stat(&self, path: &Path) -> io::Result<Option<DirectoryEntry>> {
        let path = normalize(path);
        // the entry itself is not followed, only the directories above it
        let key = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => self.resolve(parent).join(name),
            _ => path.clone(),
        };
        Ok(self
            .nodes
            .get(&key)
            .map(|node| self.describe(entry_name(&path), node)))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.nodes.get(&self.resolve(path)).map(|node| &node.kind) {
            Some(NodeKind::File(data)) => Ok(data.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }

    fn identity(&self, path: &Path) -> Option<DirIdentity> {
        let resolved = self.resolve(path);
        self.nodes
            .contains_key(&resolved)
            .then_some(DirIdentity::Path(resolved))
    }
}

/// Drop `.` components so `a/./b` and `a/b` name the same node
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(fs: &MemoryFileSystem, dir: &str) -> Vec<String> {
        fs.list(Path::new(dir), &NamePattern::Any)
            .unwrap()
            .map(|entry| entry.unwrap().name)
            .collect()
    }

    #[test]
    fn test_listing_keeps_insertion_order() {
        let mut fs = MemoryFileSystem::new();
        fs.add_file("bin/zeta", b"z".to_vec())
            .add_dir("bin/alpha")
            .add_file("bin/mid", b"m".to_vec());

        assert_eq!(names(&fs, "bin"), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_parents_created() {
        let mut fs = MemoryFileSystem::new();
        fs.add_file("bin/$RABC/sub/deep.txt", vec![0u8; 7]);

        assert_eq!(names(&fs, "bin"), vec!["$RABC"]);
        assert_eq!(names(&fs, "bin/$RABC/sub"), vec!["deep.txt"]);

        let sub = fs.stat(Path::new("bin/$RABC/sub")).unwrap().unwrap();
        assert!(sub.is_directory);
        let deep = fs.stat(Path::new("bin/$RABC/sub/deep.txt")).unwrap().unwrap();
        assert_eq!(deep.size, 7);
    }

    #[test]
    fn test_list_missing_directory() {
        let fs = MemoryFileSystem::new();
        let err = fs.list(Path::new("nowhere"), &NamePattern::Any).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_links_resolve_to_target() {
        let mut fs = MemoryFileSystem::new();
        fs.add_file("root/a/file", b"x".to_vec())
            .add_dir_link("root/a/loop", "root/a");

        assert_eq!(names(&fs, "root/a/loop"), vec!["file", "loop"]);
        assert_eq!(
            fs.identity(Path::new("root/a/loop")),
            fs.identity(Path::new("root/a"))
        );
        assert_eq!(fs.read(Path::new("root/a/loop/file")).unwrap(), b"x");
    }

    #[test]
    fn test_times_and_hidden() {
        let mut fs = MemoryFileSystem::new();
        let t = FileTime::from_ticks(132_223_104_000_000_000);
        fs.add_file("f", b"".to_vec()).set_times("f", t, t, t).set_hidden("f", true);

        let entry = fs.stat(Path::new("f")).unwrap().unwrap();
        assert_eq!(entry.created_at, Some(t));
        assert!(entry.is_hidden);
    }
}
