//! slapd.d tree reader.
//!
//! Layout of the directory this module reads:
//!
//! ```text
//! slapd.d/
//!   cn=config.ldif
//!   cn=config/
//!     cn=schema/cn={0}core.ldif ...
//!     olcDatabase={-1}frontend.ldif      (ignored)
//!     olcDatabase={0}config.ldif         (ignored)
//!     olcDatabase={1}mdb.ldif
//!     olcDatabase={1}mdb/olcOverlay={0}memberof.ldif ...
//! ```
//!
//! Every file holds exactly one entry. Listings are ordered by the `{n}`
//! ordinal in the RDN, then by name.

use crate::error::SourceError;
use ldapmig_core::schema::strip_ordering_prefix;
use ldapmig_core::{
    parse_attribute_type, parse_object_class, AttributeType, Database, IndexDecl, IndexKind,
    LdifReader, LdifRecord, ObjectClass, Overlay, SourceConfig,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "cn=config.ldif";
const CONFIG_DIR: &str = "cn=config";
const SCHEMA_DIR: &str = "cn=schema";
const DATABASE_PREFIX: &str = "olcDatabase=";
const IGNORED_DATABASES: &[&str] = &["olcDatabase={0}config", "olcDatabase={-1}frontend"];
const LDIF_EXTENSION: &str = ".ldif";

const MEMBER_OF_CLASS: &str = "olcMemberOf";
const REFINT_CLASS: &str = "olcRefintConfig";
const UNIQUE_CLASS: &str = "olcUniqueConfig";
const DEFAULT_MEMBER_ATTRIBUTE: &str = "member";

/// A parsed slapd.d directory.
#[derive(Debug, Clone)]
pub struct SlapdConfig {
    /// Root of the directory.
    pub path: PathBuf,
    /// The global `cn=config` entry.
    pub global: LdifRecord,
    /// Schema, databases and overlays.
    pub source: SourceConfig,
}

impl SlapdConfig {
    /// Read a slapd.d directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading slapd.d");

        let global = read_entry(&path.join(CONFIG_FILE))?;
        let config_dir = path.join(CONFIG_DIR);

        let (attributes, classes) = read_schema(&config_dir.join(SCHEMA_DIR))?;
        let databases = database_names(&config_dir)?
            .into_iter()
            .map(|name| read_database(&config_dir, &name))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            attributes = attributes.len(),
            classes = classes.len(),
            databases = databases.len(),
            "parsed slapd.d"
        );
        Ok(Self {
            path: path.to_path_buf(),
            global,
            source: SourceConfig {
                attributes,
                classes,
                databases,
            },
        })
    }

    /// Consume into the source model.
    pub fn into_source(self) -> SourceConfig {
        self.source
    }
}

/// Read a slapd.d directory into the source model.
pub fn load_source(path: impl AsRef<Path>) -> Result<SourceConfig, SourceError> {
    SlapdConfig::load(path).map(SlapdConfig::into_source)
}

/// Read a file holding exactly one entry.
fn read_entry(path: &Path) -> Result<LdifRecord, SourceError> {
    let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
    let mut records = LdifReader::new(BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| SourceError::Ldif {
            path: path.to_path_buf(),
            source,
        })?;

    let count = records.len();
    match (records.pop(), count) {
        (Some(record), 1) => Ok(record),
        _ => Err(SourceError::EntryCount {
            path: path.to_path_buf(),
            count,
        }),
    }
}

/// `{n}` ordinal of an RDN value such as `olcDatabase={1}mdb`.
fn ordinal(name: &str) -> Option<i64> {
    let start = name.find('{')?;
    let end = start + name[start..].find('}')?;
    name[start + 1..end].parse().ok()
}

/// `.ldif` file stems in a directory, ordinal order. A missing directory is
/// empty.
fn sorted_stems(dir: &Path) -> Result<Vec<String>, SourceError> {
    let listing = match std::fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SourceError::io(dir, e)),
    };

    let mut stems = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|e| SourceError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stem) = name.strip_suffix(LDIF_EXTENSION) {
            stems.push(stem.to_string());
        }
    }
    stems.sort_by(|a, b| ordinal(a).cmp(&ordinal(b)).then_with(|| a.cmp(b)));
    Ok(stems)
}

fn read_schema(dir: &Path) -> Result<(Vec<AttributeType>, Vec<ObjectClass>), SourceError> {
    let mut attributes = Vec::new();
    let mut classes = Vec::new();

    for stem in sorted_stems(dir)? {
        let path = dir.join(format!("{}{}", stem, LDIF_EXTENSION));
        let entry = read_entry(&path)?;

        for value in entry.get_str("olcAttributeTypes") {
            let definition = strip_ordering_prefix(value);
            let attr = parse_attribute_type(definition).map_err(|source| SourceError::Schema {
                path: path.clone(),
                definition: definition.to_string(),
                source,
            })?;
            attributes.push(attr);
        }
        for value in entry.get_str("olcObjectClasses") {
            let definition = strip_ordering_prefix(value);
            let class = parse_object_class(definition).map_err(|source| SourceError::Schema {
                path: path.clone(),
                definition: definition.to_string(),
                source,
            })?;
            classes.push(class);
        }
        debug!(schema = %stem, "schema file read");
    }
    Ok((attributes, classes))
}

fn database_names(config_dir: &Path) -> Result<Vec<String>, SourceError> {
    let names: Vec<String> = sorted_stems(config_dir)?
        .into_iter()
        .filter(|stem| stem.starts_with(DATABASE_PREFIX) && !IGNORED_DATABASES.contains(&stem.as_str()))
        .collect();
    debug!(databases = ?names, "databases found");
    Ok(names)
}

fn read_database(config_dir: &Path, name: &str) -> Result<Database, SourceError> {
    let path = config_dir.join(format!("{}{}", name, LDIF_EXTENSION));
    let entry = read_entry(&path)?;

    let suffix = entry
        .first_str("olcSuffix")
        .ok_or_else(|| SourceError::MissingAttribute {
            path: path.clone(),
            attribute: "olcSuffix",
        })?;
    let identifier = entry
        .first_str("entryUUID")
        .unwrap_or_else(|| name.trim_start_matches(DATABASE_PREFIX));

    let mut database = Database::new(suffix, identifier);
    database.indexes = parse_indexes(&entry.get_str("olcDbIndex"), &path)?;

    let overlay_dir = config_dir.join(name);
    for stem in sorted_stems(&overlay_dir)? {
        let overlay_path = overlay_dir.join(format!("{}{}", stem, LDIF_EXTENSION));
        let overlay = classify_overlay(&read_entry(&overlay_path)?);
        debug!(suffix = %database.suffix, overlay = %overlay.kind(), "overlay read");
        database.overlays.push(overlay);
    }

    info!(
        suffix = %database.suffix,
        indexes = database.indexes.len(),
        overlays = database.overlays.len(),
        "database read"
    );
    Ok(database)
}

/// Read `olcDbIndex` values of the form `attr[,attr] [kind[,kind]]`.
///
/// The `default` pseudo-attribute sets the kinds used by declarations that
/// name none; without it those declarations index equality.
fn parse_indexes(values: &[&str], path: &Path) -> Result<Vec<IndexDecl>, SourceError> {
    let invalid = |value: &str| SourceError::InvalidIndex {
        path: path.to_path_buf(),
        value: value.to_string(),
    };

    let mut parsed = Vec::new();
    let mut defaults = vec![IndexKind::Equality];
    for value in values {
        let mut parts = value.split_whitespace();
        let attrs = parts.next().ok_or_else(|| invalid(value))?;
        let kinds = match parts.next() {
            Some(kinds) => Some(parse_kinds(kinds).ok_or_else(|| invalid(value))?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid(value));
        }

        if attrs.eq_ignore_ascii_case("default") {
            defaults = kinds.ok_or_else(|| invalid(value))?;
            continue;
        }
        for attr in attrs.split(',').filter(|a| !a.is_empty()) {
            parsed.push((attr.to_string(), kinds.clone()));
        }
    }

    Ok(parsed
        .into_iter()
        .map(|(attr, kinds)| IndexDecl::new(attr, kinds.unwrap_or_else(|| defaults.clone())))
        .collect())
}

fn parse_kinds(keywords: &str) -> Option<Vec<IndexKind>> {
    let mut kinds = Vec::new();
    for keyword in keywords.split(',').filter(|k| !k.is_empty()) {
        let kind = IndexKind::from_keyword(keyword)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Some(kinds)
}

/// Classify an overlay entry by its object classes.
fn classify_overlay(entry: &LdifRecord) -> Overlay {
    let object_classes: Vec<String> = entry
        .get_str("objectClass")
        .into_iter()
        .map(str::to_string)
        .collect();
    let has_class = |name: &str| object_classes.iter().any(|c| c.eq_ignore_ascii_case(name));

    if has_class(MEMBER_OF_CLASS) {
        let mut attributes: Vec<String> = entry
            .get_str("olcMemberOfMemberAD")
            .into_iter()
            .map(str::to_string)
            .collect();
        if attributes.is_empty() {
            attributes.push(DEFAULT_MEMBER_ATTRIBUTE.to_string());
        }
        Overlay::MemberOf { attributes }
    } else if has_class(REFINT_CLASS) {
        Overlay::ReferentialIntegrity {
            attributes: entry
                .get_str("olcRefintAttribute")
                .into_iter()
                .flat_map(str::split_whitespace)
                .map(str::to_string)
                .collect(),
        }
    } else if has_class(UNIQUE_CLASS) {
        let mut attributes: Vec<String> = Vec::new();
        let declared = entry
            .get_str("olcUniqueAttribute")
            .into_iter()
            .flat_map(str::split_whitespace)
            .map(str::to_string);
        let from_uris = entry
            .get_str("olcUniqueURI")
            .into_iter()
            .flat_map(unique_uri_attributes);
        for attr in declared.chain(from_uris) {
            if !attributes.iter().any(|a| a.eq_ignore_ascii_case(&attr)) {
                attributes.push(attr);
            }
        }
        Overlay::AttributeUniqueness { attributes }
    } else {
        let name = rdn_value(&entry.dn).to_string();
        warn!(overlay = %name, "overlay has no known equivalent");
        Overlay::Unknown { name, object_classes }
    }
}

/// Attribute list of a uniqueness URI: `[ignore|strict] ldap:///base?attrs?scope?filter`.
fn unique_uri_attributes(value: &str) -> Vec<String> {
    let uri = value
        .split_whitespace()
        .find(|part| part.starts_with("ldap://"))
        .unwrap_or(value);
    uri.split('?')
        .nth(1)
        .map(|attrs| {
            attrs
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Value of the first RDN of a DN.
fn rdn_value(dn: &str) -> &str {
    let rdn = dn.split(',').next().unwrap_or(dn);
    rdn.split_once('=').map(|(_, v)| v).unwrap_or(rdn)
}
