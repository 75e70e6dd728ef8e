//! Reading a complete slapd.d tree and planning from it.

use ldapmig_core::{
    parse_attribute_type, parse_object_class, IndexDecl, IndexKind, InMemoryTarget,
    MigrationAction, MigrationOptions, MigrationPlan, Overlay, SchemaElement, TargetAccessor,
};
use ldapmig_openldap::{load_source, SlapdConfig, SourceError};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

const HEADER: &str = "# AUTO-GENERATED FILE - DO NOT EDIT!! Use ldapmodify.\n# CRC32 0b1e5c4a\n";

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("{}{}", HEADER, body)).unwrap();
}

fn fixture(root: &Path) {
    write(
        root,
        "cn=config.ldif",
        "dn: cn=config\nobjectClass: olcGlobal\ncn: config\nolcArgsFile: /var/run/slapd.args\n",
    );
    write(
        root,
        "cn=config/cn=schema/cn={0}core.ldif",
        "dn: cn={0}core,cn=schema,cn=config\n\
         objectClass: olcSchemaConfig\n\
         cn: {0}core\n\
         olcAttributeTypes: {0}( 2.5.4.41 NAME 'name' EQUALITY caseIgnoreMatch SUBSTR\n  caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{32768} )\n\
         olcAttributeTypes: {1}( 2.5.4.3 NAME ( 'cn' 'commonName' ) DESC 'RFC4519: common name(s)' SUP name )\n\
         olcObjectClasses: {0}( 2.5.6.6 NAME 'person' DESC 'RFC2256: a person' SUP top\n  STRUCTURAL MUST ( sn $ cn ) MAY ( userPassword $ telephoneNumber ) )\n",
    );
    write(
        root,
        "cn=config/cn=schema/cn={1}suse.ldif",
        "dn: cn={1}suse,cn=schema,cn=config\n\
         objectClass: olcSchemaConfig\n\
         cn: {1}suse\n\
         olcObjectClasses: {0}( 1.3.6.1.4.1.7057.10.1.2.1.2 NAME 'suseModuleConfiguration' SUP top STRUCTURAL MUST cn MAY ( suseDefaultBase $ suseDefaultTemplate ) )\n",
    );
    write(
        root,
        "cn=config/olcDatabase={-1}frontend.ldif",
        "dn: olcDatabase={-1}frontend,cn=config\nobjectClass: olcDatabaseConfig\nolcDatabase: {-1}frontend\n",
    );
    write(
        root,
        "cn=config/olcDatabase={0}config.ldif",
        "dn: olcDatabase={0}config,cn=config\nobjectClass: olcDatabaseConfig\nolcDatabase: {0}config\n",
    );
    write(
        root,
        "cn=config/olcDatabase={2}mdb.ldif",
        "dn: olcDatabase={2}mdb,cn=config\n\
         objectClass: olcDatabaseConfig\n\
         objectClass: olcMdbConfig\n\
         olcDatabase: {2}mdb\n\
         olcSuffix: dc=example,dc=net\n\
         olcDbIndex: objectClass eq\n\
         entryUUID: 8f3a2c55-4b0e-103b-9d0c-c5a4f1a8f1b2\n",
    );
    write(
        root,
        "cn=config/olcDatabase={1}mdb.ldif",
        "dn: olcDatabase={1}mdb,cn=config\n\
         objectClass: olcDatabaseConfig\n\
         objectClass: olcMdbConfig\n\
         olcDatabase: {1}mdb\n\
         olcSuffix: dc=example,dc=com\n\
         olcDbIndex: objectClass eq\n\
         olcDbIndex: cn,uid eq,sub\n\
         olcDbIndex: member pres,eq\n",
    );
    write(
        root,
        "cn=config/olcDatabase={1}mdb/olcOverlay={0}memberof.ldif",
        "dn: olcOverlay={0}memberof,olcDatabase={1}mdb,cn=config\n\
         objectClass: olcOverlayConfig\n\
         objectClass: olcMemberOf\n\
         olcOverlay: {0}memberof\n\
         olcMemberOfMemberAD: uniqueMember\n",
    );
    write(
        root,
        "cn=config/olcDatabase={1}mdb/olcOverlay={1}refint.ldif",
        "dn: olcOverlay={1}refint,olcDatabase={1}mdb,cn=config\n\
         objectClass: olcOverlayConfig\n\
         objectClass: olcRefintConfig\n\
         olcOverlay: {1}refint\n\
         olcRefintAttribute: member uniqueMember\n",
    );
    write(
        root,
        "cn=config/olcDatabase={1}mdb/olcOverlay={2}syncprov.ldif",
        "dn: olcOverlay={2}syncprov,olcDatabase={1}mdb,cn=config\n\
         objectClass: olcOverlayConfig\n\
         objectClass: olcSyncProvConfig\n\
         olcOverlay: {2}syncprov\n",
    );
}

#[test]
fn reads_schema_and_databases() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let config = SlapdConfig::load(dir.path()).unwrap();
    assert_eq!(config.global.dn, "cn=config");

    let source = config.into_source();
    let attrs: Vec<&str> = source.attributes.iter().map(|a| a.oid.as_str()).collect();
    assert_eq!(attrs, vec!["2.5.4.41", "2.5.4.3"]);
    assert!(source.classes.iter().any(|c| c.has_name("suseModuleConfiguration")));
    assert_eq!(source.classes[0].must, vec!["sn", "cn"]);

    let suffixes: Vec<&str> = source.databases.iter().map(|d| d.suffix.as_str()).collect();
    assert_eq!(suffixes, vec!["dc=example,dc=com", "dc=example,dc=net"]);

    let com = &source.databases[0];
    assert_eq!(com.identifier, "{1}mdb");
    assert_eq!(com.backend_name(), "1mdb");
    assert_eq!(
        com.indexes,
        vec![
            IndexDecl::new("objectClass", [IndexKind::Equality]),
            IndexDecl::new("cn", [IndexKind::Equality, IndexKind::Substring]),
            IndexDecl::new("uid", [IndexKind::Equality, IndexKind::Substring]),
            IndexDecl::new("member", [IndexKind::Presence, IndexKind::Equality]),
        ]
    );
    assert_eq!(
        com.overlays,
        vec![
            Overlay::MemberOf {
                attributes: vec!["uniqueMember".into()]
            },
            Overlay::ReferentialIntegrity {
                attributes: vec!["member".into(), "uniqueMember".into()]
            },
            Overlay::Unknown {
                name: "{2}syncprov".into(),
                object_classes: vec!["olcOverlayConfig".into(), "olcSyncProvConfig".into()],
            },
        ]
    );

    let net = &source.databases[1];
    assert_eq!(net.identifier, "8f3a2c55-4b0e-103b-9d0c-c5a4f1a8f1b2");
    assert!(net.overlays.is_empty());
}

#[test]
fn plans_against_empty_target() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let source = load_source(dir.path()).unwrap();

    let target = InMemoryTarget::new();
    let plan = MigrationPlan::generate(&source, &target, &MigrationOptions::default()).unwrap();

    let creates = plan
        .iter()
        .filter(|a| matches!(a, MigrationAction::DatabaseCreate { .. }))
        .count();
    assert_eq!(creates, 2);
    assert_eq!(plan.advisories().count(), 1);
    assert!(plan.iter().any(|a| matches!(
        a,
        MigrationAction::PluginRefintAttributes { attribute } if attribute == "uniqueMember"
    )));
}

#[test]
fn spelled_out_core_schema_is_not_inconsistent() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let source = load_source(dir.path()).unwrap();

    let target = InMemoryTarget::new();
    for definition in [
        "( 2.5.4.41 NAME 'name' EQUALITY caseIgnoreMatch SUBSTR caseIgnoreSubstringsMatch \
         SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 X-ORIGIN 'RFC 4519' )",
        "( 2.5.4.3 NAME ( 'cn' 'commonName' ) SUP name EQUALITY caseIgnoreMatch \
         SUBSTR caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 X-ORIGIN 'RFC 4519' )",
    ] {
        target
            .add_attribute_type(&parse_attribute_type(definition).unwrap())
            .unwrap();
    }
    target
        .add_object_class(
            &parse_object_class(
                "( 2.5.6.6 NAME 'person' SUP 2.5.6.0 STRUCTURAL MUST ( sn $ commonName ) \
                 MAY ( userPassword $ telephoneNumber ) X-ORIGIN 'RFC 4519' )",
            )
            .unwrap(),
        )
        .unwrap();

    let plan = MigrationPlan::generate(&source, &target, &MigrationOptions::default()).unwrap();
    assert!(!plan.iter().any(|a| matches!(
        a,
        MigrationAction::SchemaAttributeInconsistent { .. }
            | MigrationAction::SchemaClassInconsistent { .. }
    )));
    assert!(!plan.iter().any(|a| matches!(
        a,
        MigrationAction::SchemaAttributeCreate { attribute } if attribute.oid == "2.5.4.3"
    )));
}

#[test]
fn missing_suffix_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(
        dir.path(),
        "cn=config/olcDatabase={3}mdb.ldif",
        "dn: olcDatabase={3}mdb,cn=config\nobjectClass: olcDatabaseConfig\nolcDatabase: {3}mdb\n",
    );

    let err = load_source(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        SourceError::MissingAttribute {
            attribute: "olcSuffix",
            ..
        }
    ));
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_source(dir.path()).unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
}
