//! Data import planning and the entry transform applied while staging.

use super::action::MigrationAction;
use super::error::MigrationError;
use super::options::MigrationOptions;
use crate::ldif::{LdifReader, LdifRecord, LdifWriter};
use crate::target::TargetAccessor;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Computed group membership attribute.
pub const MEMBER_OF_ATTRIBUTE: &str = "memberOf";

/// Object class marking an entry whose membership is already computed.
pub const MEMBER_OF_CLASS: &str = "nsMemberOf";

/// Source-vendor attributes that are never portable.
pub const NON_PORTABLE_ATTRIBUTES: &[&str] = &["entryCSN", "structuralObjectClass"];

/// Emit one import action per configured data file, in suffix order.
pub(crate) fn plan_imports(options: &MigrationOptions, actions: &mut Vec<MigrationAction>) {
    let Some(imports) = &options.ldif_imports else {
        return;
    };
    for (suffix, path) in imports {
        debug!(%suffix, path = %path.display(), "planning import");
        actions.push(MigrationAction::DatabaseLdifImport {
            suffix: suffix.clone(),
            path: path.clone(),
            strip_attributes: options.skip_entry_attributes.clone(),
        });
    }
}

/// Rewrite one record for the target.
///
/// Adds [`MEMBER_OF_CLASS`] when the record carries [`MEMBER_OF_ATTRIBUTE`]
/// and does not already have the class, then strips the non-portable
/// attributes and `extra_strip`. Absent attributes are ignored, so the
/// transform is idempotent.
pub fn transform_record(record: &mut LdifRecord, extra_strip: &[String]) {
    let names = record.name_map();

    if names.contains_key(&MEMBER_OF_ATTRIBUTE.to_ascii_lowercase()) {
        let object_class = names
            .get("objectclass")
            .cloned()
            .unwrap_or_else(|| "objectClass".to_string());
        let present = record
            .get_str(&object_class)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(MEMBER_OF_CLASS));
        if !present {
            record.add_value(&object_class, MEMBER_OF_CLASS);
        }
    }

    let strip = NON_PORTABLE_ATTRIBUTES
        .iter()
        .copied()
        .chain(extra_strip.iter().map(String::as_str));
    for attr in strip {
        if let Some(actual) = names.get(&attr.to_ascii_lowercase()) {
            record.remove_attribute(actual);
        }
    }
}

/// Stream `source` through [`transform_record`] into `staged`. Returns the
/// number of records written.
pub fn stage_ldif(source: &Path, staged: &Path, extra_strip: &[String]) -> Result<usize, MigrationError> {
    let reader = LdifReader::new(BufReader::new(File::open(source)?));
    let mut writer = LdifWriter::new(BufWriter::new(File::create(staged)?));

    for record in reader {
        let mut record = record?;
        transform_record(&mut record, extra_strip);
        writer.write_record(&record)?;
    }

    let count = writer.records_written();
    writer.finish()?;
    Ok(count)
}

/// Stage a data file and bulk import it into the backend serving `suffix`,
/// blocking until the import task completes.
pub(crate) fn import_ldif(
    target: &dyn TargetAccessor,
    suffix: &str,
    source: &Path,
    extra_strip: &[String],
    staging_dir: &Path,
) -> Result<(), MigrationError> {
    let backend = target.backend(suffix)?;
    std::fs::create_dir_all(staging_dir)?;
    let staged = staging_dir.join(format!("{}.ldif", backend.name));

    let count = stage_ldif(source, &staged, extra_strip)?;
    debug!(%suffix, staged = %staged.display(), records = count, "data file staged");

    let task = target.import_ldif(&backend, &staged)?;
    target.wait_task(&task)?;
    info!(%suffix, records = count, "import complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn member() -> LdifRecord {
        LdifRecord::new("uid=alice,ou=people,dc=test")
            .with_value("objectClass", "inetOrgPerson")
            .with_value("uid", "alice")
            .with_value("memberOf", "cn=admins,ou=groups,dc=test")
            .with_value("entryCSN", "20240101000000.000000Z#000000#000#000000")
            .with_value("structuralObjectClass", "inetOrgPerson")
    }

    #[test]
    fn test_transform_adds_class_and_strips() {
        let mut record = member();
        transform_record(&mut record, &[]);

        assert_eq!(
            record.get_str("objectClass"),
            vec!["inetOrgPerson", MEMBER_OF_CLASS]
        );
        assert!(!record.has_attribute("entryCSN"));
        assert!(!record.has_attribute("structuralObjectClass"));
        assert!(record.has_attribute("memberOf"));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let mut once = member();
        transform_record(&mut once, &[]);
        let mut twice = once.clone();
        transform_record(&mut twice, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_transform_without_member_of() {
        let mut record = LdifRecord::new("dc=test")
            .with_value("objectclass", "domain")
            .with_value("ENTRYCSN", "x")
            .with_value("description", "d");
        transform_record(&mut record, &["Description".to_string()]);
        assert_eq!(record.get_str("objectClass"), vec!["domain"]);
        assert!(!record.has_attribute("entrycsn"));
        assert!(!record.has_attribute("description"));
    }

    #[test]
    fn test_transform_creates_object_class() {
        let mut record = LdifRecord::new("cn=x").with_value("MEMBEROF", "cn=g");
        transform_record(&mut record, &[]);
        assert_eq!(record.get_str("objectClass"), vec![MEMBER_OF_CLASS]);
    }

    #[test]
    fn test_plan_imports() {
        let mut actions = Vec::new();
        plan_imports(&MigrationOptions::default(), &mut actions);
        assert!(actions.is_empty());

        let options = MigrationOptions::new()
            .with_skip_entry_attribute("pwdHistory")
            .with_ldif_import("dc=test", "/data/test.ldif");
        plan_imports(&options, &mut actions);
        assert_eq!(
            actions,
            vec![MigrationAction::DatabaseLdifImport {
                suffix: "dc=test".into(),
                path: "/data/test.ldif".into(),
                strip_attributes: vec!["pwdHistory".into()],
            }]
        );
    }

    #[test]
    fn test_stage_ldif() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.ldif");
        std::fs::write(
            &source,
            "dn: uid=alice,dc=test\nobjectClass: account\nuid: alice\n\
             memberOf: cn=g,dc=test\nentryCSN: 1\n",
        )
        .unwrap();

        let staged = dir.path().join("staged.ldif");
        assert_eq!(stage_ldif(&source, &staged, &[]).unwrap(), 1);

        let text = std::fs::read_to_string(&staged).unwrap();
        assert!(text.contains("objectClass: nsMemberOf"));
        assert!(!text.contains("entryCSN"));
    }
}
