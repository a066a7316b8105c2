//! # Store and Groups
//!
//! A store is a directory identified by a `tickstore.meta` file; groups
//! are nested subdirectories. Tables live inside groups as `.tbl` files.
//! Group and table names share one namespace per group, the way datasets
//! and sub-groups share a namespace in hierarchical container formats.
//!
//! The meta file is just the fixed identity header, written and read
//! with ordinary file I/O; only table files are memory-mapped.
//!
//! Names are restricted to keep them portable as file names: non-empty,
//! no path separators, no leading dot.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{bail, ensure, Result, WrapErr};
use zerocopy::IntoBytes;

use crate::config::HEADER_REGION_SIZE;
use crate::container::headers::StoreMetaHeader;

pub const META_FILE_NAME: &str = "tickstore.meta";
pub const TABLE_FILE_EXTENSION: &str = "tbl";

/// Validates a group or table name for use as a file name.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "name cannot be empty");
    ensure!(
        !name.contains('/') && !name.contains('\\'),
        "name '{}' cannot contain path separators",
        name
    );
    ensure!(
        !name.starts_with('.'),
        "name '{}' cannot start with a dot",
        name
    );
    Ok(())
}

/// An open store: the root group of a directory whose meta file has been
/// validated.
#[derive(Debug)]
pub struct Store {
    root: Group,
}

impl Store {
    /// Creates a new store directory. Fails if a store already exists at
    /// the path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base = path.as_ref().to_path_buf();

        fs::create_dir_all(&base)
            .wrap_err_with(|| format!("failed to create store directory '{}'", base.display()))?;

        let meta_path = base.join(META_FILE_NAME);
        ensure!(
            !meta_path.exists(),
            "a store already exists at '{}'",
            base.display()
        );

        let header = StoreMetaHeader::new(HEADER_REGION_SIZE as u32);
        fs::write(&meta_path, header.as_bytes())
            .wrap_err_with(|| format!("failed to write store meta file '{}'", meta_path.display()))?;

        Ok(Self {
            root: Group { path: base },
        })
    }

    /// Opens an existing store, validating its meta file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base = path.as_ref().to_path_buf();
        let meta_path = base.join(META_FILE_NAME);

        ensure!(
            meta_path.exists(),
            "no store exists at '{}'",
            base.display()
        );

        let meta_bytes = fs::read(&meta_path)
            .wrap_err_with(|| format!("failed to read store meta file '{}'", meta_path.display()))?;
        let header = StoreMetaHeader::from_bytes(&meta_bytes)?;
        ensure!(
            header.header_region() as usize == HEADER_REGION_SIZE,
            "store header region {} does not match build header region {}",
            header.header_region(),
            HEADER_REGION_SIZE
        );

        Ok(Self {
            root: Group { path: base },
        })
    }

    /// Opens the store if one exists at the path, otherwise creates it.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base = path.as_ref();
        if base.join(META_FILE_NAME).exists() {
            Self::open(base)
        } else {
            Self::create(base)
        }
    }

    /// True when a store meta file exists at the path.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().join(META_FILE_NAME).exists()
    }

    pub fn root(&self) -> &Group {
        &self.root
    }
}

/// A group within a store: a directory that holds tables and sub-groups.
#[derive(Debug, Clone)]
pub struct Group {
    path: PathBuf,
}

impl Group {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file path a table of the given name would occupy in this group.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.{}", name, TABLE_FILE_EXTENSION))
    }

    /// Creates a child group. Fails if a child of that name exists.
    pub fn create_group(&self, name: &str) -> Result<Group> {
        validate_name(name)?;
        let child = self.path.join(name);
        if child.exists() {
            bail!("group '{}' already exists in '{}'", name, self.path.display());
        }
        fs::create_dir(&child)
            .wrap_err_with(|| format!("failed to create group '{}'", child.display()))?;
        Ok(Group { path: child })
    }

    /// Opens a child group. Fails if it does not exist.
    pub fn open_group(&self, name: &str) -> Result<Group> {
        validate_name(name)?;
        let child = self.path.join(name);
        ensure!(
            child.is_dir(),
            "group '{}' does not exist in '{}'",
            name,
            self.path.display()
        );
        Ok(Group { path: child })
    }

    /// Silent existence probe; never surfaces an error.
    pub fn group_exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.path.join(name).is_dir()
    }

    /// Names of all children (sub-groups and tables) in sorted order.
    pub fn children(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.path)
            .wrap_err_with(|| format!("failed to list group '{}'", self.path.display()))?;
        for entry in entries {
            let entry = entry.wrap_err("failed to read directory entry")?;
            let path = entry.path();
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') || name == META_FILE_NAME {
                continue;
            }
            if path.is_dir() {
                names.push(name.to_string());
            } else if let Some(stem) = name.strip_suffix(&format!(".{}", TABLE_FILE_EXTENSION)) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
