//! Configuration loader: a YAML document tree with `!include`/`!env` tags,
//! a search path, and a left-base/right-overlay deep merge.
//!
//! The *shape* follows `klipper-host::config::PrinterConfig::load` (a typed
//! struct assembled by a loader walking named sections, errors wrapped with
//! context); the format is YAML rather than INI because Milton's on-disk
//! config is YAML, so `serde_yaml` is the natural substitute for
//! `configparser`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::MiltonError;

/// Explicit, threaded search-path state, rather than a global mutable
/// search path. Directories are searched in order for bare include names.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    pub search_dirs: Vec<PathBuf>,
}

impl ConfigContext {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// Builds the default search path: cwd, `$HOME/.config/milton`,
    /// `$MILTON_BASE/share/milton/config`. `$HOME/.miltonenv`, if present,
    /// is sourced first (simple `KEY=VALUE` lines) so it can export
    /// `MILTON_BASE` before that directory is computed.
    pub fn from_env() -> Self {
        if let Some(home) = std::env::var_os("HOME") {
            Self::source_miltonenv(Path::new(&home).join(".miltonenv"));
        }

        let mut dirs = vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))];

        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".config").join("milton"));
        }
        if let Some(base) = std::env::var_os("MILTON_BASE") {
            dirs.push(PathBuf::from(base).join("share").join("milton").join("config"));
        }

        Self { search_dirs: dirs }
    }

    /// Prepends `dir` to the search path, matching `--library`'s
    /// repeatable-prepend semantics.
    pub fn with_library(mut self, dir: PathBuf) -> Self {
        self.search_dirs.insert(0, dir);
        self
    }

    fn source_miltonenv(path: PathBuf) {
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return;
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            if let Some((key, value)) = line.split_once('=') {
                if std::env::var_os(key.trim()).is_none() {
                    std::env::set_var(key.trim(), value.trim().trim_matches('"'));
                }
            }
        }
    }

    /// Resolves a bare or relative include name against `relative_to` (the
    /// including file's directory) first, then the search path.
    fn resolve(&self, name: &str, relative_to: &Path) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() && candidate.exists() {
            return Some(candidate.to_path_buf());
        }
        let near = relative_to.join(candidate);
        if near.exists() {
            return Some(near);
        }
        for dir in &self.search_dirs {
            let full = dir.join(candidate);
            if full.exists() {
                return Some(full);
            }
        }
        None
    }
}

/// Loads `path`, resolving `!include`/`!env` tags and deep-merging included
/// content beneath the including document, then deserializes into `T`.
pub fn load<T: for<'de> Deserialize<'de>>(path: &Path, ctx: &ConfigContext) -> Result<T, MiltonError> {
    let mut stack = HashSet::new();
    let value = load_value(path, ctx, &mut stack)?;
    serde_yaml::from_value(value).map_err(|source| MiltonError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads `path` same as [`load`], then layers each `--override` document atop
/// it in order: `dotted_path`, if given, nests the override's own document
/// under that path before merging (e.g. `Some("profile")` merges the
/// override file's top-level mapping in as the value of the `profile` key).
pub fn load_with_overrides<T: for<'de> Deserialize<'de>>(
    path: &Path,
    overrides: &[(Option<String>, PathBuf)],
    ctx: &ConfigContext,
) -> Result<T, MiltonError> {
    let mut stack = HashSet::new();
    let mut value = load_value(path, ctx, &mut stack)?;

    for (dotted_path, override_path) in overrides {
        let mut stack = HashSet::new();
        let mut overlay = load_value(override_path, ctx, &mut stack)?;
        if let Some(dotted) = dotted_path {
            overlay = nest_under_path(overlay, dotted);
        }
        value = merge(value, overlay);
    }

    serde_yaml::from_value(value).map_err(|source| MiltonError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Wraps `value` in nested single-key mappings so it sits at `dotted.path`
/// once merged beneath a document's root, e.g. `"a.b"` wraps `value` as
/// `{a: {b: value}}`.
fn nest_under_path(value: Value, dotted_path: &str) -> Value {
    dotted_path.split('.').rev().fold(value, |acc, segment| {
        let mut map = serde_yaml::Mapping::new();
        map.insert(Value::String(segment.to_string()), acc);
        Value::Mapping(map)
    })
}

fn load_value(path: &Path, ctx: &ConfigContext, stack: &mut HashSet<PathBuf>) -> Result<Value, MiltonError> {
    let canonical = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());

    if !stack.insert(canonical.clone()) {
        return Err(MiltonError::CircularInclude(canonical.display().to_string()));
    }

    if !path.exists() {
        return Err(MiltonError::ConfigNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|_| MiltonError::ConfigNotFound(path.to_path_buf()))?;
    let raw: Value = serde_yaml::from_str(&text).map_err(|source| MiltonError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let resolved = resolve_tags(raw, ctx, &dir, stack)?;

    stack.remove(&canonical);
    Ok(resolved)
}

/// Recursively expands `!include`/`!env` tags within `value`, merging any
/// included document beneath its surrounding siblings.
fn resolve_tags(
    value: Value,
    ctx: &ConfigContext,
    dir: &Path,
    stack: &mut HashSet<PathBuf>,
) -> Result<Value, MiltonError> {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            match tag.as_str() {
                "!include" => resolve_include(tagged.value, ctx, dir, stack),
                "!env" => {
                    let Value::String(s) = &tagged.value else {
                        return resolve_tags(tagged.value, ctx, dir, stack);
                    };
                    Ok(Value::String(expand_env(s)))
                }
                _ => resolve_tags(tagged.value, ctx, dir, stack),
            }
        }
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (k, v) in map {
                out.insert(resolve_tags(k, ctx, dir, stack)?, resolve_tags(v, ctx, dir, stack)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::Sequence(seq) => Ok(Value::Sequence(
            seq.into_iter()
                .map(|v| resolve_tags(v, ctx, dir, stack))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        other => Ok(other),
    }
}

fn resolve_include(
    spec: Value,
    ctx: &ConfigContext,
    dir: &Path,
    stack: &mut HashSet<PathBuf>,
) -> Result<Value, MiltonError> {
    let Value::String(raw) = spec else {
        return Err(MiltonError::ConfigParse {
            path: dir.to_path_buf(),
            source: serde::de::Error::custom("!include target must be a string"),
        });
    };
    let optional = raw.ends_with('?');
    let name = raw.strip_suffix('?').unwrap_or(&raw);

    match ctx.resolve(name, dir) {
        Some(path) => load_value(&path, ctx, stack),
        None if optional => Ok(Value::Mapping(serde_yaml::Mapping::new())),
        None => Err(MiltonError::ConfigNotFound(dir.join(name))),
    }
}

/// Substitutes `$VAR`/`${VAR}` references with the named environment
/// variable, leaving unrecognized/unset references untouched.
fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            out.push_str(&std::env::var(&name).unwrap_or_default());
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push('$');
            } else {
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
        }
    }
    out
}

/// Deep-merges `overlay` atop `base`: matching map keys recurse, matching
/// sequences concatenate (`base` then `overlay`), and any other conflict —
/// including a type mismatch — takes `overlay`'s value outright.
pub fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Mapping(base_map)
        }
        (Value::Sequence(mut base_seq), Value::Sequence(overlay_seq)) => {
            base_seq.extend(overlay_seq);
            Value::Sequence(base_seq)
        }
        (_, overlay) => overlay,
    }
}
