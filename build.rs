use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const ENV_PREFIX: &str = "SCAFFOLD_";

fn rust_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in fs::read_dir(&next)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Every `SCAFFOLD_[A-Z0-9_]+` token in `source`.
fn env_names(source: &str) -> impl Iterator<Item = String> + '_ {
    source.match_indices(ENV_PREFIX).filter_map(move |(start, _)| {
        let rest = &source[start + ENV_PREFIX.len()..];
        let len = rest
            .find(|ch: char| !(ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_'))
            .unwrap_or(rest.len());
        let suffix = rest[..len].trim_end_matches('_');
        (!suffix.is_empty()).then(|| format!("{ENV_PREFIX}{suffix}"))
    })
}

fn main() {
    let mut names = BTreeSet::new();
    let sources = rust_sources(Path::new("src")).expect("failed to scan src/ for env names");
    for path in sources {
        if let Ok(text) = fs::read_to_string(&path) {
            names.extend(env_names(&text));
        }
    }

    let mut generated = String::from("pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[\n");
    for name in &names {
        generated.push_str(&format!("    {name:?},\n"));
    }
    generated.push_str("];\n");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("scaffold_env_allowlist.rs"), generated)
        .expect("failed to write env allowlist");

    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    println!("cargo:rustc-env=BUILD_ID={version}+{secs:x}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
