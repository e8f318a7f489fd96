//! TOML-backed product directory.
//!
//! File layout:
//!
//! ```toml
//! [products]
//! ULUS10391 = "Monster Hunter Freedom Unite"
//!
//! [crosslinks]
//! ULES01213 = "ULUS10391"
//! ```
//!
//! Unknown product codes seen at login are appended to `[products]` and
//! the file is rewritten. I/O failures are logged and never reach the
//! hub: resolution keeps working from memory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use adhoc_core::{MemoryDirectory, ProductDirectory};
use adhoc_protocol::ProductCode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    products: BTreeMap<String, String>,
    #[serde(default)]
    crosslinks: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct TomlProductDirectory {
    path: PathBuf,
    inner: MemoryDirectory,
}

impl TomlProductDirectory {
    /// Load `path`, or start empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut inner = MemoryDirectory::new();

        if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading product directory {}", path.display()))?;
            let file: DirectoryFile = toml::from_str(&text)
                .with_context(|| format!("parsing product directory {}", path.display()))?;

            for (code, name) in file.products {
                match ProductCode::parse(&code) {
                    Some(code) => inner.add_product(code, name),
                    None => warn!("ignoring invalid product id {:?} in {}", code, path.display()),
                }
            }
            for (from, to) in file.crosslinks {
                match (ProductCode::parse(&from), ProductCode::parse(&to)) {
                    (Some(from), Some(to)) => inner.add_crosslink(from, to),
                    _ => warn!("ignoring invalid crosslink {:?} -> {:?}", from, to),
                }
            }
            info!(
                "loaded {} products and {} crosslinks from {}",
                inner.products().len(),
                inner.crosslinks().len(),
                path.display()
            );
        }

        Ok(TomlProductDirectory { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inner(&self) -> &MemoryDirectory {
        &self.inner
    }

    /// Write the whole directory back to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let file = DirectoryFile {
            products: self
                .inner
                .products()
                .iter()
                .map(|(code, name)| (code.to_string(), name.clone()))
                .collect(),
            crosslinks: self
                .inner
                .crosslinks()
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        };
        let text = toml::to_string(&file).context("serializing product directory")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, text)
            .with_context(|| format!("writing product directory {}", self.path.display()))
    }
}

impl ProductDirectory for TomlProductDirectory {
    fn resolve_canonical_product(&mut self, code: ProductCode) -> ProductCode {
        let (canonical, added) = self.inner.resolve(code);
        if added {
            if let Err(e) = self.save() {
                warn!("product directory not saved: {:#}", e);
            }
        }
        canonical
    }

    fn display_name(&self, code: &ProductCode) -> Option<String> {
        self.inner.display_name(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("adhoc-dir-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir.join("products.toml")
    }

    #[test]
    fn missing_file_starts_empty_and_records_new_codes() {
        let path = temp_path("new");
        let mut dir = TomlProductDirectory::open(&path).unwrap();
        assert!(dir.inner().products().is_empty());

        let code = ProductCode::parse("NPJH50505").unwrap();
        assert_eq!(dir.resolve_canonical_product(code), code);
        assert!(path.exists());

        let reopened = TomlProductDirectory::open(&path).unwrap();
        assert_eq!(reopened.display_name(&code).as_deref(), Some("NPJH50505"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn loads_names_and_crosslinks() {
        let path = temp_path("load");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"
[products]
ULUS10391 = "Monster Hunter Freedom Unite"
bad = "skipped"

[crosslinks]
ULES01213 = "ULUS10391"
"#,
        )
        .unwrap();

        let mut dir = TomlProductDirectory::open(&path).unwrap();
        let us = ProductCode::parse("ULUS10391").unwrap();
        let eu = ProductCode::parse("ULES01213").unwrap();
        assert_eq!(dir.inner().products().len(), 1);
        assert_eq!(dir.resolve_canonical_product(eu), us);
        assert_eq!(
            dir.display_name(&us).as_deref(),
            Some("Monster Hunter Freedom Unite")
        );
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[products\n").unwrap();
        assert!(TomlProductDirectory::open(&path).is_err());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
