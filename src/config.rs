use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};

use crate::cache::LayoutCache;
use crate::error::RegisterError;
use crate::field::FieldSpec;
use crate::layout::Packing;
use crate::register::Record;
use crate::store::{ByteStore, SharedStore};

/// Default cache file, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "memcache.json";
/// Default record span in bytes.
pub const DEFAULT_SPAN: usize = 32;

/// Configuration for [`LayoutCache::from_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON cache file. `None` keeps the cache in memory only.
    pub path: Option<PathBuf>,
    /// Drop an entry the first time it is served.
    #[serde(default)]
    pub consume_on_hit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(DEFAULT_CACHE_FILE)),
            consume_on_hit: false,
        }
    }
}

/// A record declaration as it appears in configuration files.
///
/// ```json
/// {
///   "name": "HEADER",
///   "start_offset": 0,
///   "span": 16,
///   "fields": [["INITD", 1, true], ["TYPE", 5], ["DATE", 1, "H"]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: SmolStr,
    #[serde(default)]
    pub start_offset: usize,
    #[serde(default = "default_span")]
    pub span: usize,
    #[serde(default)]
    pub packing: Packing,
    pub fields: Vec<FieldSpec>,
}

fn default_span() -> usize {
    DEFAULT_SPAN
}

impl Declaration {
    pub fn from_json(text: &str) -> Result<Self, RegisterError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Several declarations from one JSON array.
    pub fn list_from_json(text: &str) -> Result<Vec<Self>, RegisterError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegisterError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RegisterError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json(&text)
    }

    /// Build the record this declaration describes.
    pub fn open<S: ByteStore>(
        &self,
        store: SharedStore<S>,
        cache: &mut LayoutCache,
    ) -> Result<Record<S>, RegisterError> {
        Record::with_packing(
            &self.name,
            store,
            self.start_offset,
            self.span,
            &self.fields,
            self.packing,
            cache,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;
    use crate::store::{MemStore, shared};

    #[test]
    fn test_declaration_defaults() {
        let decl = Declaration::from_json(r#"{"name": "nvam", "fields": [["REPL", 1, true]]}"#).unwrap();
        assert_eq!(decl.start_offset, 0);
        assert_eq!(decl.span, DEFAULT_SPAN);
        assert_eq!(decl.packing, Packing::BitsFirst);
        assert_eq!(decl.fields, vec![FieldSpec::bit("REPL", 1)]);
    }

    #[test]
    fn test_declaration_builds_record() {
        let decl = Declaration::from_json(
            r#"{
                "name": "HEADER",
                "start_offset": 4,
                "span": 16,
                "packing": "declared",
                "fields": [["INITD", 1, true], ["TYPE", 5], ["DATE", 1, "H"]]
            }"#,
        )
        .unwrap();
        let store = shared(MemStore::new(32));
        let mut cache = LayoutCache::in_memory();
        let mut rec = decl.open(store.clone(), &mut cache).unwrap();
        rec.set("DATE", 0x0102u16).unwrap();
        rec.commit().unwrap();
        // INITD byte, then TYPE (5 bytes), then DATE at window offset 6
        assert_eq!(&store.borrow().as_bytes()[10..12], &[0x02, 0x01]);
    }

    #[test]
    fn test_declaration_list_and_errors() {
        let decls = Declaration::list_from_json(
            r#"[{"name": "A", "fields": []}, {"name": "B", "span": 4, "fields": [["X", 2]]}]"#,
        )
        .unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].span, 4);

        assert!(matches!(
            Declaration::from_json(r#"{"fields": []}"#),
            Err(RegisterError::Config(_))
        ));
        assert!(matches!(
            Declaration::from_file("/definitely/not/here.json"),
            Err(RegisterError::Config(_))
        ));
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.path.as_deref(), Some(Path::new(DEFAULT_CACHE_FILE)));
        assert!(!config.consume_on_hit);
    }
}
