use std::collections::BTreeMap;

use common::SongId;
use serde::Serialize;

use crate::error::GrooveError;

/// A validated, slash-separated path relative to the explorer root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorerPath {
    segments: Vec<String>,
}

impl ExplorerPath {
    pub fn parse(raw: &str) -> Result<Self, GrooveError> {
        let normalized = raw.replace('\\', "/");
        let trimmed = normalized.strip_prefix('/').unwrap_or(&normalized);
        if trimmed.is_empty() {
            return Err(GrooveError::InvalidPath(raw.to_string()));
        }
        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() || part == "." || part == ".." {
                return Err(GrooveError::InvalidPath(raw.to_string()));
            }
            segments.push(part.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn file_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExplorerNode {
    Directory(Directory),
    File(File),
}

impl ExplorerNode {
    pub fn name(&self) -> &str {
        match self {
            ExplorerNode::Directory(dir) => &dir.name,
            ExplorerNode::File(file) => &file.name,
        }
    }

    pub fn child(&self, name: &str) -> Option<&ExplorerNode> {
        match self {
            ExplorerNode::Directory(dir) => dir.children.get(name),
            ExplorerNode::File(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    name: String,
    children: BTreeMap<String, ExplorerNode>,
}

impl Directory {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> impl Iterator<Item = &ExplorerNode> {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&ExplorerNode> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn collect_files(&self, out: &mut Vec<SongId>) {
        for child in self.children.values() {
            match child {
                ExplorerNode::Directory(dir) => dir.collect_files(out),
                ExplorerNode::File(file) => out.extend(file.data),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    name: String,
    pub data: Option<SongId>,
}

impl File {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExplorerEntry {
    Directory { name: String, children: usize },
    File { name: String, song_id: Option<SongId> },
}

impl ExplorerEntry {
    fn from_node(node: &ExplorerNode) -> Self {
        match node {
            ExplorerNode::Directory(dir) => ExplorerEntry::Directory {
                name: dir.name.clone(),
                children: dir.children.len(),
            },
            ExplorerNode::File(file) => ExplorerEntry::File {
                name: file.name.clone(),
                song_id: file.data,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExplorerEntry::Directory { name, .. } | ExplorerEntry::File { name, .. } => name,
        }
    }
}

/// Folder tree of indexed songs, keyed by path segment.
#[derive(Clone, Debug)]
pub struct GrooveExplorer {
    root: Directory,
}

impl GrooveExplorer {
    pub fn new(root_name: &str) -> Self {
        Self {
            root: Directory::named(root_name),
        }
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    pub fn reset(&mut self) {
        self.root = Directory::named(&self.root.name);
    }

    /// Walks to `path`, creating missing directories, and returns the file at
    /// its end. Re-adding a path returns the file that is already there.
    pub fn add_relative_path(&mut self, path: &ExplorerPath) -> Result<&mut File, GrooveError> {
        let (last, parents) = match path.segments.split_last() {
            Some(split) => split,
            None => return Err(invalid(path)),
        };
        let mut dir = &mut self.root;
        for segment in parents {
            let node = dir
                .children
                .entry(segment.clone())
                .or_insert_with(|| ExplorerNode::Directory(Directory::named(segment)));
            dir = match node {
                ExplorerNode::Directory(child) => child,
                ExplorerNode::File(_) => return Err(invalid(path)),
            };
        }
        let node = dir
            .children
            .entry(last.clone())
            .or_insert_with(|| ExplorerNode::File(File::named(last)));
        match node {
            ExplorerNode::File(file) => Ok(file),
            ExplorerNode::Directory(_) => Err(invalid(path)),
        }
    }

    /// Removes the file at `path` and prunes directories it leaves empty.
    pub fn remove_relative_path(&mut self, path: &ExplorerPath) -> Option<File> {
        remove_in(&mut self.root, path.segments())
    }

    pub fn get(&self, path: &ExplorerPath) -> Option<&ExplorerNode> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut node = self.root.children.get(first)?;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Resolves a folder; an empty string or `/` is the root.
    pub fn directory(&self, raw: &str) -> Result<Option<&Directory>, GrooveError> {
        if is_root(raw) {
            return Ok(Some(&self.root));
        }
        let path = ExplorerPath::parse(raw)?;
        Ok(match self.get(&path) {
            Some(ExplorerNode::Directory(dir)) => Some(dir),
            _ => None,
        })
    }

    /// Immediate children of a folder, directories first, then by name.
    pub fn list(&self, raw: &str) -> Result<Option<Vec<ExplorerEntry>>, GrooveError> {
        let dir = match self.directory(raw)? {
            Some(dir) => dir,
            None => return Ok(None),
        };
        let mut entries: Vec<ExplorerEntry> =
            dir.children.values().map(ExplorerEntry::from_node).collect();
        entries.sort_by_key(|entry| matches!(entry, ExplorerEntry::File { .. }));
        Ok(Some(entries))
    }

    /// Every song id stored at or below `raw`.
    pub fn files_under(&self, raw: &str) -> Result<Vec<SongId>, GrooveError> {
        let mut out = Vec::new();
        if is_root(raw) {
            self.root.collect_files(&mut out);
            return Ok(out);
        }
        let path = ExplorerPath::parse(raw)?;
        match self.get(&path) {
            Some(ExplorerNode::Directory(dir)) => dir.collect_files(&mut out),
            Some(ExplorerNode::File(file)) => out.extend(file.data),
            None => {}
        }
        Ok(out)
    }
}

fn remove_in(dir: &mut Directory, segments: &[String]) -> Option<File> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        if !matches!(dir.children.get(first), Some(ExplorerNode::File(_))) {
            return None;
        }
        return match dir.children.remove(first) {
            Some(ExplorerNode::File(file)) => Some(file),
            _ => None,
        };
    }
    let child = match dir.children.get_mut(first) {
        Some(ExplorerNode::Directory(child)) => child,
        _ => return None,
    };
    let removed = remove_in(child, rest);
    if removed.is_some() && child.is_empty() {
        dir.children.remove(first);
    }
    removed
}

fn is_root(raw: &str) -> bool {
    raw.is_empty() || raw == "/"
}

fn invalid(path: &ExplorerPath) -> GrooveError {
    GrooveError::InvalidPath(path.segments().join("/"))
}
