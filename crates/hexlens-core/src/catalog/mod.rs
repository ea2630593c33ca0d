//! Template Catalog.
//!
//! A two-level store of Protocols and their child Commands, persisted under
//! a root directory (one subdirectory per protocol group) and indexed in
//! memory for key lookup and byte-stream matching.
//!
//! - `model`: the tagged `Template` records and `Field`
//! - `store`: deterministic on-disk layout and legacy file tolerance
//! - `index`: in-memory indices and key resolution
//! - `matcher`: selection of the template matching a byte stream
//! - `error`: catalog error kinds
//!
//! Every mutating call validates first, writes to disk second and updates
//! the indices last, so a failed call leaves memory untouched.

pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod store;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::decode::decode_field;
use crate::hex::canonical_id;
use crate::ParsedRecord;

pub use error::CatalogError;
use index::CatalogIndex;
use model::{Command, Field, Protocol, Template, group_of};
use store::{LegacyCommand, TemplateStore};

/// Field addressed by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Index(usize),
    Name(String),
}

impl FromStr for FieldRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(s.trim().to_string()),
        })
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// The catalog service: persistent store plus in-memory indices.
///
/// # Examples
/// ```
/// use hexlens_core::{Catalog, Command, Endian, Field, Protocol, Template};
///
/// let dir = std::env::temp_dir().join(format!("hexlens-doc-{}", std::process::id()));
/// let mut catalog = Catalog::open(&dir);
/// catalog.save(&Template::Protocol(Protocol::new("TestProto", "AA")))?;
/// let mut ping = Command::new("TestProto", "Ping", "05");
/// ping.header.fields.push(Field::new("seq", "u16", 5, 6, Endian::Big));
/// catalog.save(&Template::Command(ping))?;
///
/// let template = catalog.match_hex("AA0000050001020304").expect("match");
/// assert_eq!(template.name(), "Ping");
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), hexlens_core::CatalogError>(())
/// ```
#[derive(Debug)]
pub struct Catalog {
    store: TemplateStore,
    index: CatalogIndex,
    /// `group → legacy files` whose records were loaded into the index and
    /// are deleted once the group's `commands.json` is rewritten.
    legacy: BTreeMap<String, Vec<PathBuf>>,
}

impl Catalog {
    /// Open the catalog rooted at `root` and load it. Never fails: unreadable
    /// files are logged and skipped, a missing root is an empty catalog.
    pub fn open(root: impl AsRef<Path>) -> Self {
        let mut catalog = Self {
            store: TemplateStore::new(root.as_ref()),
            index: CatalogIndex::default(),
            legacy: BTreeMap::new(),
        };
        catalog.reload();
        catalog
    }

    /// Rebuild the indices from disk.
    pub fn reload(&mut self) {
        let contents = self.store.load();
        let mut index = CatalogIndex::default();

        for protocol in contents.protocols {
            match normalize_protocol(protocol) {
                Ok(protocol) => index.insert_protocol(protocol),
                Err(err) => warn!(%err, "skipping invalid protocol record"),
            }
        }
        let mut legacy: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let commands = contents
            .commands
            .into_iter()
            .map(|command| (None::<PathBuf>, command))
            .chain(
                contents
                    .legacy_commands
                    .into_iter()
                    .map(|LegacyCommand { path, command }| (Some(path), command)),
            );
        for (path, command) in commands {
            let command = match normalize_command(command) {
                Ok(command) => command,
                Err(err) => {
                    warn!(%err, "skipping invalid command record");
                    continue;
                }
            };
            if index.protocol_by_name(&command.protocol_name).is_none() {
                warn!(
                    command = %command.header.name,
                    protocol = %command.protocol_name,
                    "command has no protocol.json in its group"
                );
            }
            if let Some(path) = path {
                legacy.entry(command.header.group.clone()).or_default().push(path);
            }
            index.insert_loaded_command(command);
        }
        index.rebuild_names();

        info!(
            root = %self.store.root().display(),
            templates = index.len(),
            "template catalog loaded"
        );
        self.index = index;
        self.legacy = legacy;
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Every template in deterministic order.
    pub fn list(&self) -> Vec<Template> {
        self.index.templates()
    }

    /// Lookup by `<group>/<id>`, `<group>/<id>/<name>` or protocol name.
    ///
    /// When several commands share `<group>/<id>` the first in insertion
    /// order is returned.
    pub fn get_by_key(&self, key: &str) -> Option<Template> {
        self.index.resolve(key).into_iter().next()
    }

    /// Every template addressed by `key`.
    pub fn resolve(&self, key: &str) -> Vec<Template> {
        self.index.resolve(key)
    }

    /// The single template addressed by `key`.
    ///
    /// # Errors
    /// `UnknownTemplate` when nothing matches, `AmbiguousKey` when several
    /// commands share the key.
    pub fn template(&self, key: &str) -> Result<Template, CatalogError> {
        self.index.resolve_one(key)
    }

    /// A copy of the field at `at` in the template addressed by `key`.
    pub fn field(&self, key: &str, at: &FieldRef) -> Result<Field, CatalogError> {
        let template = self.index.resolve_one(key)?;
        let position = field_position(&template, at, key)?;
        Ok(template.fields()[position].clone())
    }

    pub fn protocol(&self, name: &str) -> Option<&Protocol> {
        self.index.protocol_by_name(name)
    }

    /// Latest saved command carrying `name`.
    pub fn command_by_name(&self, name: &str) -> Option<&Command> {
        self.index.command_by_name(name)
    }

    /// Commands owned by the protocol `name`, by id then insertion order.
    pub fn commands_of(&self, name: &str) -> Vec<&Command> {
        let group = group_of(name);
        self.index
            .protocol_commands()
            .iter()
            .filter(|(protocol, _)| group_of(protocol) == group)
            .flat_map(|(_, ids)| ids.values())
            .flatten()
            .collect()
    }

    /// Persist a template (deep copy of the input) and index it.
    ///
    /// Returns the stored form: ids uppercased, `protocol_id_dec` and `group`
    /// derived, field types normalised.
    ///
    /// # Errors
    /// `InvalidInput`/`OddLengthHex` for malformed names or ids,
    /// `DuplicateName` for name collisions, `UnknownTemplate` when a
    /// command's protocol does not exist, `Io`/`Json` on disk failures.
    pub fn save(&mut self, template: &Template) -> Result<Template, CatalogError> {
        match template.clone() {
            Template::Protocol(protocol) => self.save_protocol(protocol).map(Template::Protocol),
            Template::Command(command) => self.save_command(command).map(Template::Command),
        }
    }

    fn save_protocol(&mut self, protocol: Protocol) -> Result<Protocol, CatalogError> {
        let protocol = normalize_protocol(protocol)?;
        if let Some(existing) = self.index.protocol_by_group(&protocol.header.group) {
            if existing.header.name != protocol.header.name {
                return Err(CatalogError::DuplicateName {
                    name: protocol.header.name,
                    scope: format!("protocol group '{}'", existing.header.group),
                });
            }
        }
        self.store.write_protocol(&protocol)?;
        self.index.insert_protocol(protocol.clone());
        info!(key = %Template::Protocol(protocol.clone()).key(), "protocol saved");
        Ok(protocol)
    }

    fn save_command(&mut self, command: Command) -> Result<Command, CatalogError> {
        let mut command = normalize_command(command)?;
        let owner = self
            .index
            .protocol_by_name(&command.protocol_name)
            .ok_or_else(|| CatalogError::unknown(command.protocol_name.clone()))?;
        command.protocol_name = owner.header.name.clone();
        command.header.group = owner.header.group.clone();
        let group = command.header.group.clone();

        let mut table = self.index.group_commands(&group);
        let list = table
            .entry(command.protocol_name.clone())
            .or_default()
            .entry(command.command_id().to_string())
            .or_default();
        upsert_command(list, command.clone())?;

        self.store.write_commands(&group, &table)?;
        self.index.set_group_commands(&group, table);
        self.index.note_command(&command);
        self.drop_consolidated_legacy(&group);
        info!(key = %Template::Command(command.clone()).full_key(), "command saved");
        Ok(command)
    }

    /// Delete the templates addressed by `key`.
    ///
    /// `<group>/<id>` deletes the group's protocol when its id matches
    /// (cascading to all of its commands), otherwise every command with that
    /// id; `<group>/<id>/<name>` deletes one command; a bare protocol name
    /// deletes that protocol. Returns the deleted templates.
    ///
    /// # Errors
    /// `UnknownTemplate` when nothing matches, `Io` on disk failures.
    pub fn delete(&mut self, key: &str) -> Result<Vec<Template>, CatalogError> {
        let targets = self.index.resolve(key);
        let Some(first) = targets.first() else {
            return Err(CatalogError::unknown(key));
        };
        let group = first.group();

        if let Template::Protocol(_) = first {
            let mut deleted = targets.clone();
            deleted.extend(self.commands_of(first.name()).into_iter().cloned().map(Template::Command));
            let legacy = self.legacy.get(&group).cloned().unwrap_or_default();
            self.store.remove_group(&group, &legacy)?;
            self.index.remove_group(&group);
            self.legacy.remove(&group);
            info!(key = %key, deleted = deleted.len(), "protocol deleted with its commands");
            return Ok(deleted);
        }

        let doomed: HashSet<String> = targets.iter().map(Template::full_key).collect();
        let mut table = self.index.group_commands(&group);
        for ids in table.values_mut() {
            for list in ids.values_mut() {
                list.retain(|command| {
                    !doomed.contains(&Template::Command(command.clone()).full_key())
                });
            }
        }
        self.store.write_commands(&group, &table)?;
        self.drop_consolidated_legacy(&group);
        self.store.prune_group_dir(&group)?;
        self.index.set_group_commands(&group, table);
        self.index.rebuild_names();
        info!(key = %key, deleted = targets.len(), "commands deleted");
        Ok(targets)
    }

    /// Delete the legacy files of `group` once `commands.json` holds their
    /// records. A failure keeps the paths for the next rewrite.
    fn drop_consolidated_legacy(&mut self, group: &str) {
        let Some(paths) = self.legacy.remove(group) else {
            return;
        };
        if let Err(err) = self.store.remove_legacy_files(&paths) {
            warn!(%err, group = %group, "legacy command files left in place");
            self.legacy.insert(group.to_string(), paths);
        }
    }

    /// Select the template matching a canonical byte stream.
    pub fn match_hex(&self, hex: &str) -> Option<Template> {
        matcher::match_template(&self.index, hex)
    }

    /// Decode every field of `template` over `hex`.
    pub fn parse(&self, hex: &str, template: &Template) -> ParsedRecord {
        parse_template(hex, template)
    }

    /// Match then parse.
    ///
    /// # Errors
    /// `CatalogError::NoMatch` when no template matches.
    pub fn identify(&self, hex: &str) -> Result<(Template, ParsedRecord), CatalogError> {
        let template = self.match_hex(hex).ok_or(CatalogError::NoMatch)?;
        let record = parse_template(hex, &template);
        Ok((template, record))
    }

    /// Append a field to the template at `key` and re-save it.
    pub fn add_field(&mut self, key: &str, field: Field) -> Result<Template, CatalogError> {
        let mut template = self.index.resolve_one(key)?;
        validate_field(&field)?;
        if template.fields().iter().any(|f| f.name == field.name) {
            return Err(duplicate_field(&field.name, &template));
        }
        template.header_mut().fields.push(field);
        self.save(&template)
    }

    /// Replace the field at `at` and re-save the template.
    pub fn update_field(
        &mut self,
        key: &str,
        at: &FieldRef,
        field: Field,
    ) -> Result<Template, CatalogError> {
        let mut template = self.index.resolve_one(key)?;
        validate_field(&field)?;
        let position = field_position(&template, at, key)?;
        let clash = template
            .fields()
            .iter()
            .enumerate()
            .any(|(i, f)| i != position && f.name == field.name);
        if clash {
            return Err(duplicate_field(&field.name, &template));
        }
        template.header_mut().fields[position] = field;
        self.save(&template)
    }

    /// Remove the field at `at` and re-save the template.
    pub fn remove_field(&mut self, key: &str, at: &FieldRef) -> Result<Template, CatalogError> {
        let mut template = self.index.resolve_one(key)?;
        let position = field_position(&template, at, key)?;
        template.header_mut().fields.remove(position);
        self.save(&template)
    }
}

/// Decode every field of `template`; failing fields are logged and omitted.
pub fn parse_template(hex: &str, template: &Template) -> ParsedRecord {
    let hex = hex.to_ascii_uppercase();
    let fields = template
        .fields()
        .iter()
        .filter_map(|field| match decode_field(&hex, field) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                debug!(template = %template.name(), field = %field.name, %err, "field not decoded");
                None
            }
        })
        .collect();
    ParsedRecord {
        template_name: template.name().to_string(),
        template_id: template.id().to_string(),
        fields,
    }
}

fn upsert_command(list: &mut Vec<Command>, command: Command) -> Result<(), CatalogError> {
    if let Some(slot) = list
        .iter_mut()
        .find(|c| c.header.name == command.header.name && c.follow == command.follow)
    {
        *slot = command;
        return Ok(());
    }
    if list.iter().any(|c| c.follow == command.follow) {
        return Err(CatalogError::DuplicateName {
            name: command.header.name,
            scope: format!(
                "command id {} follow '{}' of protocol '{}'",
                command.header.protocol_id_hex, command.follow, command.protocol_name
            ),
        });
    }
    list.push(command);
    Ok(())
}

fn field_position(template: &Template, at: &FieldRef, key: &str) -> Result<usize, CatalogError> {
    let position = match at {
        FieldRef::Index(index) => Some(*index).filter(|i| *i < template.fields().len()),
        FieldRef::Name(name) => template.fields().iter().position(|f| &f.name == name),
    };
    position.ok_or_else(|| CatalogError::unknown(format!("{key} field {at}")))
}

fn duplicate_field(name: &str, template: &Template) -> CatalogError {
    CatalogError::DuplicateName {
        name: name.to_string(),
        scope: format!("fields of '{}'", template.name()),
    }
}

fn validate_name(name: &str, what: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::invalid(format!("{what} name is empty")));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) || name.contains(char::is_control)
    {
        return Err(CatalogError::invalid(format!(
            "{what} name '{name}' contains path or control characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_field(field: &Field) -> Result<(), CatalogError> {
    if field.name.trim().is_empty() {
        return Err(CatalogError::invalid("field name is empty"));
    }
    if field.start_pos > field.end_pos {
        return Err(CatalogError::invalid(format!(
            "field '{}' starts at {} after its end {}",
            field.name, field.start_pos, field.end_pos
        )));
    }
    Ok(())
}

fn normalize_fields(fields: &mut [Field], owner: &str) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for field in fields.iter_mut() {
        field.name = field.name.trim().to_string();
        validate_field(field)?;
        if !seen.insert(field.name.clone()) {
            return Err(CatalogError::DuplicateName {
                name: field.name.clone(),
                scope: format!("fields of '{owner}'"),
            });
        }
        field.field_type = field.saved_type();
    }
    Ok(())
}

fn normalize_protocol(mut protocol: Protocol) -> Result<Protocol, CatalogError> {
    let header = &mut protocol.header;
    header.name = validate_name(&header.name, "protocol")?;
    header.protocol_id_hex = canonical_id(&header.protocol_id_hex)
        .map_err(|err| CatalogError::from_hex(&header.protocol_id_hex, err))?;
    header.protocol_id_dec = u64::from_str_radix(&header.protocol_id_hex, 16)
        .ok()
        .or(header.protocol_id_dec);
    header.group = group_of(&header.name);
    normalize_fields(&mut header.fields, &header.name)?;
    Ok(protocol)
}

fn normalize_command(mut command: Command) -> Result<Command, CatalogError> {
    command.protocol_name = validate_name(&command.protocol_name, "protocol")?;
    let header = &mut command.header;
    header.name = validate_name(&header.name, "command")?;
    header.protocol_id_hex = canonical_id(&header.protocol_id_hex)
        .map_err(|err| CatalogError::from_hex(&header.protocol_id_hex, err))?;
    header.protocol_id_dec = u64::from_str_radix(&header.protocol_id_hex, 16)
        .ok()
        .or(header.protocol_id_dec);
    header.group = group_of(&command.protocol_name);
    normalize_fields(&mut header.fields, &header.name)?;
    if !command.follow.trim().is_empty() {
        command.follow = canonical_id(&command.follow)
            .map_err(|err| CatalogError::from_hex(&command.follow, err))?;
    } else {
        command.follow.clear();
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::Endian;

    #[test]
    fn field_ref_parses_index_or_name() {
        assert_eq!("2".parse::<FieldRef>(), Ok(FieldRef::Index(2)));
        assert_eq!("seq".parse::<FieldRef>(), Ok(FieldRef::Name("seq".into())));
    }

    #[test]
    fn normalize_command_canonicalises_ids() {
        let mut command = Command::new("Demo", "Ping", "0x0a").with_follow("ff");
        command
            .header
            .fields
            .push(Field::new("name", "char.ascii", 5, 8, Endian::Little));
        let command = normalize_command(command).unwrap();
        assert_eq!(command.header.protocol_id_hex, "0A");
        assert_eq!(command.header.protocol_id_dec, Some(10));
        assert_eq!(command.follow, "FF");
        assert_eq!(command.header.group, "demo");
        assert_eq!(command.header.fields[0].field_type, "char.ascii.4");
    }

    #[test]
    fn normalize_rejects_odd_id() {
        let err = normalize_protocol(Protocol::new("Demo", "ABC")).unwrap_err();
        assert!(matches!(err, CatalogError::OddLengthHex { .. }));
    }

    #[test]
    fn normalize_rejects_path_names() {
        let err = normalize_protocol(Protocol::new("../etc", "AA")).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput { .. }));
    }

    #[test]
    fn normalize_rejects_duplicate_fields() {
        let mut protocol = Protocol::new("Demo", "AA");
        protocol.header.fields = vec![
            Field::new("a", "u8", 0, 0, Endian::Big),
            Field::new("a", "u8", 1, 1, Endian::Big),
        ];
        let err = normalize_protocol(protocol).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
    }

    #[test]
    fn upsert_replaces_same_name_and_follow() {
        let mut list = vec![Command::new("P", "A", "10")];
        let mut updated = Command::new("P", "A", "10");
        updated.header.description = "new".into();
        upsert_command(&mut list, updated).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].header.description, "new");

        let err = upsert_command(&mut list, Command::new("P", "B", "10")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));

        upsert_command(&mut list, Command::new("P", "C", "10").with_follow("01")).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn parse_skips_failing_fields() {
        let mut command = Command::new("P", "Ping", "05");
        command.header.fields = vec![
            Field::new("seq", "u16", 5, 6, Endian::Big),
            Field::new("beyond", "u32", 8, 11, Endian::Big),
            Field::new("tail", "u8", 7, 7, Endian::Big),
        ];
        let record = parse_template("AA000005000102FF", &Template::Command(command));
        let names: Vec<_> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["seq", "tail"]);
        assert_eq!(record.template_name, "Ping");
        assert_eq!(record.template_id, "05");
    }
}
