//! Translation file codec.
//!
//! Maps storage paths to locale independent domains and back, and converts
//! file content to flat texel lists and back.

use crate::error::TexelError;
use crate::locale::default_locales;
use crate::types::Texel;
use eyre::{Result, WrapErr};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// File extensions that could be translation files.
pub const L10N_FILE_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// How a path encodes its locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    /// `folder/en/name.json`
    LocaleInDir,
    /// `folder/name.en.json`
    LocaleInName,
}

impl PathPattern {
    /// The tag stored at the end of a domain string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PathPattern::LocaleInDir => "dir",
            PathPattern::LocaleInName => "name",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "dir" => Some(PathPattern::LocaleInDir),
            "name" => Some(PathPattern::LocaleInName),
            _ => None,
        }
    }
}

/// The components of a translation file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    /// Empty or ending with `/`
    pub folder: String,
    pub name: String,
    pub locale: String,
    pub ext: String,
    pub pattern: PathPattern,
}

/// Converts between paths, domains, file content and texels.
#[derive(Debug, Clone)]
pub struct FileCodec {
    file_exp: Regex,
    domain_exp: Regex,
}

impl FileCodec {
    /// Build a codec that recognizes the given locale codes.
    pub fn new<I, S>(locales: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let locales = locales
            .into_iter()
            .map(|locale| regex::escape(locale.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        if locales.is_empty() {
            eyre::bail!("at least one locale is required");
        }
        let exts = L10N_FILE_EXTENSIONS.join("|");

        let file_exp = Regex::new(&format!(
            r"(?s)^(?:(?P<f0>.*/)?(?P<l0>{locales})/(?P<n0>[^/]+)\.(?P<e0>{exts})|(?P<f1>.*/)?(?P<n1>[^/]+)\.(?P<l1>{locales})\.(?P<e1>{exts}))$"
        ))
        .context("Failed to build file pattern")?;

        let domain_exp = Regex::new(&format!(
            r"(?s)^(?P<folder>.*/)?(?P<name>[^/]+)\.(?P<ext>{exts})\.(?P<pattern>{}|{})$",
            PathPattern::LocaleInDir.as_str(),
            PathPattern::LocaleInName.as_str(),
        ))
        .context("Failed to build domain pattern")?;

        Ok(Self { file_exp, domain_exp })
    }

    /// Build a codec over the ISO 639-1 locale table.
    pub fn with_default_locales() -> Result<Self> {
        Self::new(default_locales())
    }

    /// Determines based on a path if a file is a translation file.
    pub fn is_l10n_file(&self, path: &str) -> bool {
        self.file_exp.is_match(path)
    }

    /// Split a path into its components.
    pub fn path_info(&self, path: &str) -> Result<PathInfo> {
        let caps = self
            .file_exp
            .captures(path)
            .ok_or_else(|| eyre::eyre!(TexelError::UnrecognizedPath(path.to_string())))?;

        let group = |a: &str, b: &str| -> String {
            caps.name(a)
                .or_else(|| caps.name(b))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        let pattern = if caps.name("l0").is_some() {
            PathPattern::LocaleInDir
        } else {
            PathPattern::LocaleInName
        };

        Ok(PathInfo {
            folder: group("f0", "f1"),
            name: group("n0", "n1"),
            locale: group("l0", "l1"),
            ext: group("e0", "e1"),
            pattern,
        })
    }

    /// Generates a domain from a path. The domain loses the locale.
    pub fn path_to_domain(&self, path: &str) -> Result<String> {
        let info = self.path_info(path)?;
        Ok(format!(
            "{}{}.{}.{}",
            info.folder,
            info.name,
            info.ext,
            info.pattern.as_str()
        ))
    }

    /// Generates a path from a domain and a locale.
    pub fn domain_to_path(&self, domain: &str, locale: &str) -> Result<String> {
        let malformed = || eyre::eyre!(TexelError::MalformedDomain(domain.to_string()));
        let caps = self.domain_exp.captures(domain).ok_or_else(malformed)?;

        let folder = capture(&caps, "folder");
        let name = capture(&caps, "name");
        let ext = capture(&caps, "ext");
        match PathPattern::parse(capture(&caps, "pattern")).ok_or_else(malformed)? {
            PathPattern::LocaleInDir => Ok(format!("{folder}{locale}/{name}.{ext}")),
            PathPattern::LocaleInName => Ok(format!("{folder}{name}.{locale}.{ext}")),
        }
    }

    /// Generates texels from file content.
    pub fn parse_file(&self, path: &str, content: &str) -> Result<Vec<Texel>> {
        let info = self.path_info(path)?;
        let domain = self.path_to_domain(path)?;
        let data = parse_tree(path, &info.ext, content)?;

        let mut texels = Vec::new();
        let mut keys = Vec::new();
        flatten_keys(path, &domain, &info.locale, &data, &mut keys, &mut texels)?;
        Ok(texels)
    }

    /// Generates file content from texels.
    ///
    /// Tombstones must be filtered out by the caller.
    pub fn generate_file(&self, path: &str, texels: &[Texel]) -> Result<String> {
        let info = self.path_info(path)?;
        let tree = Value::Object(nest_keys(texels, 0));
        write_tree(path, &info.ext, &tree)
    }

    /// Applies changes to existing file content and returns the new content.
    ///
    /// Entries without a change are written back as they were, numbers,
    /// booleans and `null` included. Changes apply in order. A tombstone
    /// removes its key along with objects the removal leaves empty.
    pub fn update_file(&self, path: &str, content: &str, changes: &[Texel]) -> Result<String> {
        let info = self.path_info(path)?;
        let mut tree = match parse_tree(path, &info.ext, content)? {
            Value::Null => Value::Object(Map::new()),
            tree @ (Value::Object(_) | Value::Array(_)) => tree,
            _ => {
                return Err(eyre::eyre!(TexelError::InvalidTree {
                    path: path.to_string(),
                    keys: Vec::new(),
                }));
            }
        };

        for change in changes {
            let keys: Vec<&str> = change.key.split('.').collect();
            match &change.value {
                Some(value) => set_key(&mut tree, &keys, value),
                None => {
                    remove_key(&mut tree, &keys);
                }
            }
        }

        write_tree(path, &info.ext, &tree)
    }
}

/// Deserialize file content into a tree. Blank content is `null`.
fn parse_tree(path: &str, ext: &str, content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }

    let parse_error = |cause: String| {
        eyre::eyre!(TexelError::Parse {
            path: path.to_string(),
            content: content.to_string(),
            cause,
        })
    };

    match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str::<Value>(content).map_err(|e| parse_error(e.to_string())),
        "yml" | "yaml" => {
            let yaml = serde_yaml::from_str::<serde_yaml::Value>(content).map_err(|e| parse_error(e.to_string()))?;
            yaml_to_json(yaml).map_err(parse_error)
        }
        other => eyre::bail!("type {:?} has no parse implementation", other),
    }
}

fn write_tree(path: &str, ext: &str, tree: &Value) -> Result<String> {
    match ext.to_lowercase().as_str() {
        "json" => serde_json::to_string_pretty(tree).wrap_err_with(|| format!("Failed to generate {}", path)),
        "yml" | "yaml" => serde_yaml::to_string(tree).wrap_err_with(|| format!("Failed to generate {}", path)),
        other => eyre::bail!("type {:?} has no generate implementation", other),
    }
}

/// Set the string at a key path, replacing whatever is in the way.
fn set_key(node: &mut Value, keys: &[&str], value: &str) {
    let Some((first, rest)) = keys.split_first() else {
        *node = Value::String(value.to_string());
        return;
    };

    if let Value::Array(items) = node {
        match first.parse::<usize>() {
            Ok(index) if index < items.len() => return set_key(&mut items[index], rest, value),
            Ok(index) if index == items.len() => {
                items.push(Value::Null);
                return set_key(&mut items[index], rest, value);
            }
            _ => {}
        }
    }

    if !node.is_object() {
        *node = match node.take() {
            Value::Array(items) => items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => Value::Object(Map::new()),
        };
    }

    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_key(child, rest, value);
    }
}

/// Remove a key path. Returns true when `node` is an object left empty.
///
/// Array elements are nulled instead of removed so later indices stay put.
fn remove_key(node: &mut Value, keys: &[&str]) -> bool {
    let Some((first, rest)) = keys.split_first() else {
        return false;
    };

    match node {
        Value::Object(map) => {
            if rest.is_empty() {
                map.remove(*first);
            } else if map.get_mut(*first).is_some_and(|child| remove_key(child, rest)) {
                map.remove(*first);
            }
            map.is_empty()
        }
        Value::Array(items) => {
            if let Some(child) = first.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                if rest.is_empty() {
                    *child = Value::Null;
                } else {
                    remove_key(child, rest);
                }
            }
            false
        }
        _ => false,
    }
}

fn capture<'h>(caps: &Captures<'h>, name: &str) -> &'h str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

/// Convert a YAML tree to a JSON tree, stringifying scalar keys.
fn yaml_to_json(yaml: serde_yaml::Value) -> std::result::Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect::<Result<_, _>>()?),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported mapping key {:?}", other)),
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn flatten_keys(
    path: &str,
    domain: &str,
    locale: &str,
    data: &Value,
    keys: &mut Vec<String>,
    out: &mut Vec<Texel>,
) -> Result<()> {
    let children: Vec<(String, &Value)> = match data {
        Value::Null => return Ok(()),
        Value::Object(map) => {
            let mut children: Vec<(String, &Value)> = map.iter().map(|(k, v)| (k.clone(), v)).collect();
            children.sort_by(|a, b| a.0.cmp(&b.0));
            children
        }
        Value::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        _ => {
            return Err(eyre::eyre!(TexelError::InvalidTree {
                path: path.to_string(),
                keys: keys.clone(),
            }));
        }
    };

    for (key, value) in children {
        keys.push(key);
        match value {
            Value::Object(_) | Value::Array(_) => flatten_keys(path, domain, locale, value, keys, out)?,
            Value::Null => {}
            leaf => out.push(Texel {
                domain: domain.to_string(),
                key: keys.join("."),
                locale: locale.to_string(),
                value: Some(match leaf {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            }),
        }
        keys.pop();
    }

    Ok(())
}

/// Build a tree from texels whose keys share the first `depth` segments.
///
/// When a leaf and a subtree compete for the same key, the first texel of
/// the group decides.
fn nest_keys(texels: &[Texel], depth: usize) -> Map<String, Value> {
    let mut groups: BTreeMap<&str, Vec<&Texel>> = BTreeMap::new();
    for texel in texels {
        if let Some(segment) = texel.key.split('.').nth(depth) {
            groups.entry(segment).or_default().push(texel);
        }
    }

    let mut result = Map::new();
    for (segment, group) in groups {
        let first = group[0];
        if first.key.split('.').count() == depth + 1 {
            result.insert(segment.to_string(), Value::String(first.value.clone().unwrap_or_default()));
        } else {
            let group: Vec<Texel> = group.into_iter().cloned().collect();
            result.insert(segment.to_string(), Value::Object(nest_keys(&group, depth + 1)));
        }
    }

    result
}
