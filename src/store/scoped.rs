//! Directory-backed collection of documents for one [`Scope`].
//!
//! Every caller-supplied id is passed through [`sanitize_id`] before it is
//! turned into a path. Writes go through a temp file in the same directory
//! and are renamed into place; concurrent saves to one id are last writer
//! wins.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::store::codec::{self, Metadata, Payload};
use crate::store::document::{
    ConfigDocument, DOCUMENT_EXT, DocumentSummary, SYSTEM_ID, SavedDocument, Scope,
};
use crate::store::util::{now_display_stamp, now_id_stamp};
use crate::store::warn::{self, WarnEvent};

const FORBIDDEN_ID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make `raw` safe to use as a filename stem.
///
/// Idempotent: `sanitize_id(sanitize_id(x, f), f) == sanitize_id(x, f)` as
/// long as `fallback` is itself already clean.
pub fn sanitize_id(raw: &str, fallback: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|ch| {
            if FORBIDDEN_ID_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(&[' ', '.'][..]);
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ScopedStore {
    scope: Scope,
    dir: PathBuf,
    disambiguate_collisions: bool,
}

impl ScopedStore {
    /// Open (and create if needed) the collection at `dir`.
    pub fn open(scope: Scope, dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            scope,
            dir: dir.into(),
            disambiguate_collisions: true,
        };
        store.ensure_dir()?;
        Ok(store)
    }

    /// When false, two history saves for the same project within one second
    /// overwrite each other instead of getting a `-2` suffix.
    pub fn with_collision_suffix(mut self, enabled: bool) -> Self {
        self.disambiguate_collisions = enabled;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sanitize(&self, id: &str) -> String {
        sanitize_id(id, self.scope.fallback_id())
    }

    fn file_id(&self, id: &str) -> String {
        self.sanitize(id)
    }

    /// Lookups sanitize the caller's id in every scope; only `save` and
    /// `import` pin System to [`SYSTEM_ID`].
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.file_id(id), DOCUMENT_EXT))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).is_file()
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| StoreError::io(&self.dir, err))
    }

    fn read_text(&self, path: &Path) -> StoreResult<String> {
        fs::read_to_string(path).map_err(|err| StoreError::io(path, err))
    }

    fn current_metadata(&self, path: &Path) -> StoreResult<Option<Metadata>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = self.read_text(path)?;
        Ok(Some(codec::decode_metadata(&text).0))
    }

    /// Id a save under `key` would land on right now.
    ///
    /// System ignores `key`. Template uses it as the id. History treats it
    /// as the project name (falling back to the metadata's `project_name`,
    /// then the payload's `project.name`) and appends a second-resolution
    /// timestamp.
    fn resolve_save_id(&self, key: &str, metadata: &Metadata, payload: &Payload) -> String {
        match self.scope {
            Scope::System => SYSTEM_ID.to_string(),
            Scope::Template => self.sanitize(key),
            Scope::History => {
                let project = [
                    Some(key),
                    metadata.project_name.as_deref(),
                    payload
                        .get("project")
                        .and_then(|p| p.get("name"))
                        .and_then(Value::as_str),
                ]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|name| !name.is_empty())
                .unwrap_or("");
                let base = format!("{}-{}", self.sanitize(project), now_id_stamp());
                if !self.disambiguate_collisions {
                    return base;
                }
                let mut candidate = base.clone();
                let mut n = 2usize;
                while self.exists(&candidate) {
                    candidate = format!("{base}-{n}");
                    n += 1;
                }
                candidate
            }
        }
    }

    /// Write (overwrite) a document. See [`Self::resolve_save_id`] for how
    /// `key` maps to an id.
    pub fn save(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &Metadata,
    ) -> StoreResult<SavedDocument> {
        self.save_inner(key, payload, metadata, None)
    }

    /// Like [`Self::save`], but refuses to write unless the stored revision
    /// equals `expected` (0 for a document that does not exist yet).
    pub fn save_if_revision(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &Metadata,
        expected: u64,
    ) -> StoreResult<SavedDocument> {
        self.save_inner(key, payload, metadata, Some(expected))
    }

    fn save_inner(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &Metadata,
        expected_revision: Option<u64>,
    ) -> StoreResult<SavedDocument> {
        self.ensure_dir()?;
        let id = self.resolve_save_id(key, metadata, payload);
        let path = self.path_for(&id);

        let previous = if self.scope.has_stable_ids() {
            self.current_metadata(&path)?
        } else {
            None
        };
        let current_revision = previous
            .as_ref()
            .and_then(|meta| meta.revision)
            .unwrap_or(0);
        if let Some(expected) = expected_revision
            && expected != current_revision
        {
            return Err(StoreError::Conflict {
                scope: self.scope,
                id,
                expected,
                actual: current_revision,
            });
        }

        let now = now_display_stamp();
        let mut meta = metadata.clone();
        meta.kind = Some(self.scope);
        if meta.created_at.is_none() {
            meta.created_at = previous
                .as_ref()
                .and_then(|prev| prev.created_at.clone())
                .or_else(|| Some(now.clone()));
        }
        meta.updated_at = Some(now);
        meta.revision = if self.scope.has_stable_ids() {
            Some(current_revision + 1)
        } else {
            None
        };
        if self.scope == Scope::History && meta.project_name.is_none() {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                meta.project_name = Some(trimmed.to_string());
            }
        }

        let text = codec::encode(&meta, payload)?;
        self.write_atomic(&path, &text)?;

        Ok(SavedDocument {
            id,
            scope: self.scope,
            path,
            revision: meta.revision,
        })
    }

    fn write_atomic(&self, path: &Path, text: &str) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|err| StoreError::io(&self.dir, err))?;
        tmp.write_all(text.as_bytes())
            .map_err(|err| StoreError::io(tmp.path(), err))?;
        tmp.persist(path)
            .map_err(|err| StoreError::io(path, err.error))?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> StoreResult<Payload> {
        Ok(self.load_document(id)?.payload)
    }

    pub fn load_document(&self, id: &str) -> StoreResult<ConfigDocument> {
        let file_id = self.file_id(id);
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(StoreError::NotFound {
                scope: self.scope,
                id: file_id,
            });
        }

        let text = self.read_text(&path)?;
        let decoded = codec::decode(&text);
        if let Some(first) = decoded.skipped.first() {
            warn::emit(WarnEvent {
                code: "DECODE_SKIPPED",
                stage: "load",
                action: "decode-document",
                scope: self.scope.as_str(),
                id: &file_id,
                path: &path.display().to_string(),
                reason: &format!("{} part(s) skipped", decoded.skipped.len()),
                err: &format!("line {}: {}", first.line, first.reason),
            });
        }

        Ok(ConfigDocument {
            id: file_id,
            scope: self.scope,
            metadata: decoded.metadata,
            payload: decoded.payload,
            skipped: decoded.skipped,
            path,
        })
    }

    /// Headers of every document, newest `created_at` first. Documents that
    /// cannot be read are skipped with a warning. `limit` only applies to
    /// History; System and Template always list everything.
    pub fn list(&self, limit: Option<usize>) -> StoreResult<Vec<DocumentSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.dir, err)),
        };

        let mut out = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| StoreError::io(&self.dir, err))?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXT)
            {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    warn::emit(WarnEvent {
                        code: "E_IO",
                        stage: "list",
                        action: "read-document",
                        scope: self.scope.as_str(),
                        id: &id,
                        path: &path.display().to_string(),
                        reason: "unreadable document skipped",
                        err: &err.to_string(),
                    });
                    continue;
                }
            };
            let (metadata, skipped) = codec::decode_metadata(&text);
            if let Some(first) = skipped.first() {
                warn::emit(WarnEvent {
                    code: "DECODE_SKIPPED",
                    stage: "list",
                    action: "decode-header",
                    scope: self.scope.as_str(),
                    id: &id,
                    path: &path.display().to_string(),
                    reason: &format!("{} header field(s) skipped", skipped.len()),
                    err: &format!("{}: {}", first.what, first.reason),
                });
            }
            out.push(DocumentSummary {
                id,
                scope: self.scope,
                metadata,
                path,
            });
        }

        out.sort_by(|a, b| {
            b.created_at()
                .cmp(a.created_at())
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit
            && self.scope == Scope::History
        {
            out.truncate(limit);
        }
        Ok(out)
    }

    /// Remove a document. `Ok(false)` when there was nothing to remove.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    /// Byte-copy a document out. A directory destination receives the file
    /// under its stored name.
    pub fn export(&self, id: &str, destination: &Path) -> StoreResult<PathBuf> {
        let source = self.path_for(id);
        if !source.is_file() {
            return Err(StoreError::NotFound {
                scope: self.scope,
                id: self.file_id(id),
            });
        }

        let target = if destination.is_dir() {
            match source.file_name() {
                Some(name) => destination.join(name),
                None => destination.to_path_buf(),
            }
        } else {
            destination.to_path_buf()
        };
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        fs::copy(&source, &target).map_err(|err| StoreError::io(&target, err))?;
        Ok(target)
    }

    /// Byte-copy an external file into the collection under the sanitized
    /// stem of its filename.
    pub fn import(&self, source: &Path) -> StoreResult<SavedDocument> {
        if !source.is_file() {
            return Err(StoreError::io(
                source,
                io::Error::new(ErrorKind::NotFound, "import source does not exist"),
            ));
        }
        self.ensure_dir()?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let id = match self.scope {
            Scope::System => SYSTEM_ID.to_string(),
            Scope::Template | Scope::History => self.file_id(stem),
        };
        let target = self.path_for(&id);
        fs::copy(source, &target).map_err(|err| StoreError::io(&target, err))?;

        let revision = self
            .current_metadata(&target)?
            .and_then(|meta| meta.revision);
        Ok(SavedDocument {
            id,
            scope: self.scope,
            path: target,
            revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    fn template_meta(name: &str, created_at: &str) -> Metadata {
        Metadata {
            name: Some(name.to_string()),
            description: Some(format!("{name} starter")),
            created_at: Some(created_at.to_string()),
            ..Metadata::default()
        }
    }

    #[test]
    fn sanitize_replaces_forbidden_and_trims() {
        assert_eq!(sanitize_id("a<b>c:d\"e/f\\g|h?i*j", "config"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_id("  ..my project.. ", "config"), "my project");
        assert_eq!(sanitize_id("", "config"), "config");
        assert_eq!(sanitize_id(" . . ", "template"), "template");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(raw in any::<String>()) {
            let once = sanitize_id(&raw, "config");
            prop_assert_eq!(sanitize_id(&once, "config"), once);
        }
    }

    #[test]
    fn save_then_load_returns_payload() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path().join("templates")).expect("open");
        let body = payload(json!({
            "project": {"name": "demo"},
            "tech_stack": {"cache": ["redis"]}
        }));

        let saved = store
            .save("web/basic", &body, &template_meta("Web", "2024-01-01 00:00:00"))
            .expect("save");
        assert_eq!(saved.id, "web_basic");
        assert_eq!(saved.revision, Some(1));
        assert!(store.exists("web/basic"));
        assert_eq!(store.load("web_basic").expect("load"), body);

        let doc = store.load_document("web_basic").expect("doc");
        assert_eq!(doc.metadata.kind, Some(Scope::Template));
        assert_eq!(doc.metadata.created_at.as_deref(), Some("2024-01-01 00:00:00"));
        assert!(doc.metadata.updated_at.is_some());
    }

    #[test]
    fn saving_twice_keeps_payload_and_bumps_revision() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path()).expect("open");
        let body = payload(json!({"generation": {"generate_docker": true}}));
        let meta = template_meta("Twice", "2024-02-02 00:00:00");

        store.save("twice", &body, &meta).expect("first");
        let first = store.load("twice").expect("load first");
        let second_save = store.save("twice", &body, &meta).expect("second");
        assert_eq!(store.load("twice").expect("load second"), first);
        assert_eq!(second_save.revision, Some(2));
    }

    #[test]
    fn fixed_id_resave_keeps_original_created_at() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path()).expect("open");
        store
            .save("keep", &Payload::new(), &template_meta("Keep", "2023-05-05 05:05:05"))
            .expect("first");
        let no_created = Metadata {
            name: Some("Keep".to_string()),
            ..Metadata::default()
        };
        store.save("keep", &Payload::new(), &no_created).expect("second");
        let doc = store.load_document("keep").expect("doc");
        assert_eq!(doc.metadata.created_at.as_deref(), Some("2023-05-05 05:05:05"));
    }

    #[test]
    fn save_if_revision_detects_lost_update() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::System, tmp.path()).expect("open");
        let meta = Metadata::default();

        store
            .save_if_revision("ignored", &Payload::new(), &meta, 0)
            .expect("create");
        store
            .save_if_revision("system", &Payload::new(), &meta, 1)
            .expect("update");
        let err = store
            .save_if_revision("system", &Payload::new(), &meta, 1)
            .expect_err("stale writer");
        match err {
            StoreError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn system_scope_is_a_singleton() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::System, tmp.path()).expect("open");
        let saved = store
            .save("whatever", &payload(json!({"ui": {"theme": "dark"}})), &Metadata::default())
            .expect("save");
        assert_eq!(saved.id, SYSTEM_ID);
        assert_eq!(saved.path, tmp.path().join("system.md"));
        assert!(store.load(SYSTEM_ID).is_ok());

        assert!(!store.exists("nonexistent"));
        assert!(store.load("anything").expect_err("other id").is_not_found());
        assert!(
            store
                .export("anything", &tmp.path().join("out.md"))
                .expect_err("other id")
                .is_not_found()
        );
        assert!(!store.delete("nonexistent").expect("delete other id"));
        assert!(tmp.path().join("system.md").is_file());
        assert!(store.exists(SYSTEM_ID));

        let outside = tempdir().expect("tempdir");
        let source = outside.path().join("settings.md");
        fs::write(&source, "# System\n").expect("write source");
        let imported = store.import(&source).expect("import");
        assert_eq!(imported.path, tmp.path().join("system.md"));
    }

    #[test]
    fn history_ids_are_synthesized_and_disambiguated() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::History, tmp.path()).expect("open");
        let meta = Metadata::default();
        let body = payload(json!({"project": {"name": "acme"}}));

        let first = store.save("acme:web", &body, &meta).expect("first");
        let second = store.save("acme:web", &body, &meta).expect("second");

        assert!(first.id.starts_with("acme_web-"));
        assert_ne!(first.id, second.id);
        let doc = store.load_document(&first.id).expect("doc");
        assert_eq!(doc.metadata.project_name.as_deref(), Some("acme:web"));
        assert_eq!(doc.metadata.revision, None);
    }

    #[test]
    fn history_falls_back_to_payload_project_name() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::History, tmp.path()).expect("open");
        let body = payload(json!({"project": {"name": "from-payload"}}));
        let saved = store.save("  ", &body, &Metadata::default()).expect("save");
        assert!(saved.id.starts_with("from-payload-"));
    }

    #[test]
    fn list_orders_newest_first_and_ignores_template_limit() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path()).expect("open");
        for (id, created) in [
            ("old", "2024-01-01 00:00:00"),
            ("newest", "2024-03-01 00:00:00"),
            ("middle", "2024-02-01 00:00:00"),
        ] {
            store
                .save(id, &Payload::new(), &template_meta(id, created))
                .expect("save");
        }
        fs::write(tmp.path().join("notes.txt"), "not a document").expect("stray");

        let all = store.list(None).expect("list");
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "old"]);

        let unlimited = store.list(Some(2)).expect("templates ignore limit");
        assert_eq!(unlimited.len(), 3);
    }

    #[test]
    fn history_list_honors_limit() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::History, tmp.path()).expect("open");
        for (project, created) in [
            ("old", "2024-01-01 00:00:00"),
            ("newest", "2024-03-01 00:00:00"),
            ("middle", "2024-02-01 00:00:00"),
        ] {
            let meta = Metadata {
                created_at: Some(created.to_string()),
                ..Metadata::default()
            };
            store.save(project, &Payload::new(), &meta).expect("save");
        }

        let top = store.list(Some(2)).expect("limited");
        let names: Vec<_> = top.iter().map(|s| s.display_name()).collect();
        assert_eq!(names, vec!["newest", "middle"]);
    }

    #[test]
    fn list_tolerates_hand_edited_documents() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path()).expect("open");
        fs::write(tmp.path().join("bare.md"), "# nothing here\n").expect("write");
        let all = store.list(None).expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_name(), "bare");
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path()).expect("open");
        assert!(!store.delete("nonexistent").expect("delete missing"));
        store
            .save("gone", &Payload::new(), &Metadata::default())
            .expect("save");
        assert!(store.delete("gone").expect("delete"));
        assert!(!store.exists("gone"));
    }

    #[test]
    fn load_missing_is_not_found() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::History, tmp.path()).expect("open");
        let err = store.load("nope").expect_err("missing");
        assert!(err.is_not_found());
    }

    #[test]
    fn export_and_import_copy_bytes() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path().join("templates")).expect("open");
        let other = ScopedStore::open(Scope::Template, tmp.path().join("elsewhere")).expect("open");
        store
            .save("shared", &payload(json!({"a": 1})), &Metadata::default())
            .expect("save");

        let exported = store
            .export("shared", &tmp.path().join("out/shared-copy.md"))
            .expect("export");
        assert_eq!(
            fs::read(&exported).expect("read export"),
            fs::read(store.path_for("shared")).expect("read source")
        );

        let imported = other.import(&exported).expect("import");
        assert_eq!(imported.id, "shared-copy");
        assert_eq!(imported.revision, Some(1));
        assert_eq!(other.load("shared-copy").expect("load"), payload(json!({"a": 1})));

        assert!(store
            .export("missing", &tmp.path().join("x.md"))
            .expect_err("missing")
            .is_not_found());
        assert!(matches!(
            other.import(&tmp.path().join("absent.md")),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn export_into_directory_keeps_file_name() {
        let tmp = tempdir().expect("tempdir");
        let store = ScopedStore::open(Scope::Template, tmp.path().join("templates")).expect("open");
        store
            .save("named", &Payload::new(), &Metadata::default())
            .expect("save");
        let out_dir = tmp.path().join("exports");
        fs::create_dir_all(&out_dir).expect("mkdir");
        let target = store.export("named", &out_dir).expect("export");
        assert_eq!(target, out_dir.join("named.md"));
    }
}
