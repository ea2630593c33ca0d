use std::path::{Path, PathBuf};

use hexlens_core::{
    Catalog, CatalogError, Command, Endian, Field, FieldRef, FieldValue, Protocol, Template,
    normalize,
};
use serde_json::Value;
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()))
}

fn protocol(name: &str, id: &str) -> Template {
    Template::Protocol(Protocol::new(name, id))
}

fn command(protocol: &str, name: &str, id: &str, follow: &str, fields: Vec<Field>) -> Template {
    let mut command = Command::new(protocol, name, id).with_follow(follow);
    command.header.fields = fields;
    Template::Command(command)
}

fn seeded(root: &Path) -> Catalog {
    let mut catalog = Catalog::open(root);
    catalog.save(&protocol("TestProto", "AA")).expect("protocol");
    catalog
        .save(&command(
            "TestProto",
            "Ping",
            "05",
            "",
            vec![Field::new("seq", "u16", 5, 6, Endian::Big)],
        ))
        .expect("ping");
    catalog
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("valid json")
}

#[test]
fn wireshark_dump_matches_and_decodes() {
    let temp = TempDir::new().expect("tempdir");
    let catalog = seeded(temp.path());

    let hex = normalize(&fixture("ping_wireshark.txt"));
    let template = catalog.match_hex(&hex).expect("match");
    assert_eq!(template.name(), "Ping");

    let record = catalog.parse(&hex, &template);
    assert_eq!(record.template_name, "Ping");
    assert_eq!(record.template_id, "05");
    let seq = &record.fields[0];
    assert_eq!(seq.name, "seq");
    assert_eq!(seq.value, FieldValue::Unsigned(258));
    assert_eq!(seq.hex, "0102");
    assert_eq!(seq.span, [5, 6]);
}

#[test]
fn follow_disambiguates_shared_command_id() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Demo", "AA")).expect("protocol");
    catalog
        .save(&command("Demo", "A", "10", "01", Vec::new()))
        .expect("a");
    catalog
        .save(&command("Demo", "B", "10", "", Vec::new()))
        .expect("b");

    assert_eq!(catalog.match_hex("00112210010203").expect("a").name(), "A");
    assert_eq!(catalog.match_hex("00112210020304").expect("b").name(), "B");
    let catch_all = normalize(&fixture("catch_all_array.txt"));
    assert_eq!(catalog.match_hex(&catch_all).expect("b").name(), "B");
}

#[test]
fn multi_field_record_from_hexdump() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Sensor", "AA")).expect("protocol");
    catalog
        .save(&command(
            "Sensor",
            "Report",
            "10",
            "01",
            vec![
                Field::new("label", "char.ascii", 5, 7, Endian::Little),
                Field::new("date", "date", 10, 13, Endian::Big),
                Field::new("temp", "float", 14, 17, Endian::Little),
                Field::new("count", "u16", 18, 19, Endian::Little),
                Field::new("missing", "u32", 30, 33, Endian::Little),
            ],
        ))
        .expect("report");

    let hex = normalize(&fixture("report_hexdump.txt"));
    let (template, record) = catalog.identify(&hex).expect("identify");
    assert_eq!(template.full_key(), "sensor/10/Report");

    let values: Vec<(&str, &FieldValue)> = record
        .fields
        .iter()
        .map(|f| (f.name.as_str(), &f.value))
        .collect();
    assert_eq!(
        values,
        vec![
            ("label", &FieldValue::Text("HI!".into())),
            ("date", &FieldValue::Text("2023-10-15".into())),
            ("temp", &FieldValue::Float(3.141593)),
            ("count", &FieldValue::Unsigned(101)),
        ]
    );
    assert_eq!(record.fields[0].field_type, "char.ascii.3");
}

#[test]
fn save_then_get_by_key_round_trips() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    let mut proto = Protocol::new("TestProto", "0xaa");
    proto.header.description = "bench protocol".into();
    proto
        .header
        .fields
        .push(Field::new("len", "u8", 1, 1, Endian::Big));
    let saved = catalog.save(&Template::Protocol(proto)).expect("save");

    assert_eq!(saved.id(), "AA");
    assert_eq!(saved.header().protocol_id_dec, Some(170));
    assert_eq!(saved.group(), "testproto");
    assert_eq!(catalog.get_by_key("testproto/AA"), Some(saved.clone()));
    assert_eq!(catalog.get_by_key("TestProto"), Some(saved.clone()));

    let reopened = Catalog::open(temp.path());
    assert_eq!(reopened.get_by_key("testproto/aa"), Some(saved));
}

#[test]
fn disk_layout_is_deterministic() {
    let temp = TempDir::new().expect("tempdir");
    let _catalog = seeded(temp.path());

    let group = temp.path().join("testproto");
    let protocol = read_json(&group.join("protocol.json"));
    assert_eq!(protocol["type"], "protocol");
    assert_eq!(protocol["name"], "TestProto");
    assert_eq!(protocol["protocol_id_dec"], 170);

    let commands = read_json(&group.join("commands.json"));
    let ping = &commands["TestProto"]["05"][0];
    assert_eq!(ping["type"], "command");
    assert_eq!(ping["follow"], "");
    assert_eq!(ping["fields"][0]["endian"], "big");

    let text = std::fs::read_to_string(group.join("commands.json")).expect("read");
    assert!(text.starts_with("{\n  \"TestProto\""));
}

#[test]
fn legacy_files_load_and_consolidate_on_save() {
    let temp = TempDir::new().expect("tempdir");
    let group = temp.path().join("testproto");
    std::fs::create_dir_all(&group).expect("mkdir");
    std::fs::write(
        group.join("protocol.json"),
        r#"{"name":"TestProto","protocol_id_hex":"AA","group":"testproto","fields":[]}"#,
    )
    .expect("write protocol");
    std::fs::write(
        group.join("05.json"),
        r#"{"type":"command","name":"Ping","protocol_id_hex":"05","fields":[]}"#,
    )
    .expect("write legacy");
    std::fs::write(group.join("broken.json"), "{ nope").expect("write broken");
    std::fs::write(
        group.join("command_5_Boot.json"),
        r#"{"type":"command","name":"Boot","protocol_id_hex":"5","fields":[]}"#,
    )
    .expect("write odd id");

    let mut catalog = Catalog::open(temp.path());
    let ping = catalog.get_by_key("testproto/05").expect("legacy command");
    let Template::Command(ping) = ping else {
        panic!("expected a command");
    };
    assert_eq!(ping.protocol_name, "TestProto");
    assert_eq!(ping.follow, "");

    catalog
        .save(&command("TestProto", "Pong", "06", "", Vec::new()))
        .expect("save");
    assert!(!group.join("05.json").exists());
    assert!(group.join("commands.json").is_file());
    assert!(group.join("broken.json").is_file());
    assert!(group.join("command_5_Boot.json").is_file());

    let reopened = Catalog::open(temp.path());
    assert!(reopened.get_by_key("testproto/05").is_some());
    assert!(reopened.get_by_key("testproto/06").is_some());
}

#[test]
fn deleted_legacy_command_stays_deleted() {
    let temp = TempDir::new().expect("tempdir");
    let group = temp.path().join("testproto");
    std::fs::create_dir_all(&group).expect("mkdir");
    std::fs::write(
        group.join("protocol.json"),
        r#"{"type":"protocol","name":"TestProto","protocol_id_hex":"AA","fields":[]}"#,
    )
    .expect("write protocol");
    std::fs::write(
        group.join("05.json"),
        r#"{"name":"Ping","protocol_id_hex":"05","fields":[]}"#,
    )
    .expect("write legacy");
    std::fs::write(group.join("notes.json"), "not a template").expect("write notes");

    let mut catalog = Catalog::open(temp.path());
    catalog.delete("testproto/05").expect("delete");
    assert!(!group.join("05.json").exists());
    assert!(Catalog::open(temp.path()).get_by_key("testproto/05").is_none());

    catalog.delete("TestProto").expect("cascade");
    assert!(!group.join("protocol.json").exists());
    assert!(group.join("notes.json").is_file());
}

#[test]
fn directory_not_named_after_its_protocol_is_left_alone() {
    let temp = TempDir::new().expect("tempdir");
    let foo = temp.path().join("foo");
    std::fs::create_dir_all(&foo).expect("mkdir");
    let record = r#"{"type":"protocol","name":"Bar","protocol_id_hex":"BB","fields":[]}"#;
    std::fs::write(foo.join("protocol.json"), record).expect("write protocol");

    let mut catalog = Catalog::open(temp.path());
    assert!(catalog.is_empty());
    assert!(catalog.get_by_key("Bar").is_none());

    catalog.save(&protocol("Bar", "BB")).expect("save bar");
    catalog
        .save(&command("Bar", "Ping", "05", "", Vec::new()))
        .expect("save ping");
    catalog.delete("Bar").expect("delete bar");

    assert!(!temp.path().join("bar").exists());
    assert_eq!(
        std::fs::read_to_string(foo.join("protocol.json")).expect("read"),
        record
    );
}

#[test]
fn name_lookup_keeps_latest_save_after_unrelated_delete() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Demo", "AA")).expect("protocol");
    catalog
        .save(&command("Demo", "Dup", "02", "", Vec::new()))
        .expect("dup 02");
    catalog
        .save(&command("Demo", "Dup", "01", "", Vec::new()))
        .expect("dup 01");
    catalog
        .save(&command("Demo", "Other", "03", "", Vec::new()))
        .expect("other");
    assert_eq!(catalog.command_by_name("Dup").expect("dup").command_id(), "01");

    catalog.delete("demo/03").expect("delete other");
    assert_eq!(catalog.command_by_name("Dup").expect("dup").command_id(), "01");
}

#[test]
fn cascade_delete_removes_group() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Demo", "D0")).expect("protocol");
    catalog
        .save(&command("Demo", "Start", "01", "", Vec::new()))
        .expect("start");
    catalog
        .save(&command("Demo", "Stop", "02", "", Vec::new()))
        .expect("stop");
    assert_eq!(catalog.len(), 3);

    let deleted = catalog.delete("Demo").expect("delete");
    assert_eq!(deleted.len(), 3);
    assert!(!temp.path().join("demo").exists());
    for key in ["demo/D0", "demo/01", "demo/02", "Demo"] {
        assert!(catalog.get_by_key(key).is_none(), "{key}");
    }
    assert!(catalog.commands_of("Demo").is_empty());
    assert!(catalog.command_by_name("Start").is_none());
    assert!(catalog.is_empty());
}

#[test]
fn deleting_last_command_keeps_protocol() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = seeded(temp.path());

    let deleted = catalog.delete("testproto/05").expect("delete");
    assert_eq!(deleted.len(), 1);
    assert!(catalog.get_by_key("testproto/05").is_none());
    assert!(catalog.get_by_key("testproto/AA").is_some());
    assert!(temp.path().join("testproto").join("protocol.json").is_file());
    assert!(!temp.path().join("testproto").join("commands.json").exists());
}

#[test]
fn delete_by_name_targets_one_command() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Demo", "AA")).expect("protocol");
    catalog
        .save(&command("Demo", "A", "10", "01", Vec::new()))
        .expect("a");
    catalog
        .save(&command("Demo", "B", "10", "", Vec::new()))
        .expect("b");

    catalog.delete("demo/10/A").expect("delete");
    let left = catalog.resolve("demo/10");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name(), "B");
}

#[test]
fn errors_leave_catalog_untouched() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = seeded(temp.path());
    let before = catalog.list();

    let err = catalog
        .save(&command("Nope", "X", "01", "", Vec::new()))
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownTemplate { .. }));

    let err = catalog.save(&protocol("Other", "ABC")).unwrap_err();
    assert!(matches!(err, CatalogError::OddLengthHex { .. }));

    let err = catalog.save(&protocol("testproto", "AB")).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateName { .. }));

    let err = catalog.delete("missing/01").unwrap_err();
    assert!(matches!(err, CatalogError::UnknownTemplate { .. }));

    assert_eq!(catalog.list(), before);
}

#[test]
fn field_mutation_by_index_and_name() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = seeded(temp.path());

    let saved = catalog
        .add_field("testproto/05", Field::new("tag", "char", 7, 8, Endian::Little))
        .expect("add");
    assert_eq!(saved.fields().len(), 2);
    assert_eq!(saved.fields()[1].field_type, "char.2");

    let err = catalog
        .add_field("testproto/05", Field::new("seq", "u8", 0, 0, Endian::Big))
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateName { .. }));

    let mut seq = catalog
        .field("testproto/05", &FieldRef::Name("seq".into()))
        .expect("field");
    seq.endian = Endian::Little;
    let saved = catalog
        .update_field("testproto/05", &FieldRef::Index(0), seq)
        .expect("update");
    assert_eq!(saved.fields()[0].endian, Endian::Little);

    let saved = catalog
        .remove_field("testproto/05", &FieldRef::Name("tag".into()))
        .expect("remove");
    assert_eq!(saved.fields().len(), 1);

    let err = catalog
        .remove_field("testproto/05", &FieldRef::Index(5))
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownTemplate { .. }));

    let reopened = Catalog::open(temp.path());
    let record = reopened.identify("AA0000050001020304").expect("identify").1;
    assert_eq!(record.fields[0].value, FieldValue::Unsigned(513));
}

#[test]
fn ambiguous_key_rejects_field_mutation() {
    let temp = TempDir::new().expect("tempdir");
    let mut catalog = Catalog::open(temp.path());
    catalog.save(&protocol("Demo", "AA")).expect("protocol");
    catalog
        .save(&command("Demo", "A", "10", "01", Vec::new()))
        .expect("a");
    catalog
        .save(&command("Demo", "B", "10", "", Vec::new()))
        .expect("b");

    let err = catalog
        .add_field("demo/10", Field::new("x", "u8", 0, 0, Endian::Big))
        .unwrap_err();
    assert!(matches!(err, CatalogError::AmbiguousKey { count: 2, .. }));
    catalog
        .add_field("demo/10/B", Field::new("x", "u8", 0, 0, Endian::Big))
        .expect("named key");
}

#[test]
fn identify_reports_no_match() {
    let temp = TempDir::new().expect("tempdir");
    let catalog = seeded(temp.path());
    let err = catalog.identify("0102030405").unwrap_err();
    assert!(matches!(err, CatalogError::NoMatch));
}
