//! On-disk layout: `<root>/<group>/protocol.json` and
//! `<root>/<group>/commands.json`, plus read-only support for legacy
//! per-command files.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::error::CatalogError;
use super::model::{Command, Protocol, Template, group_of};

pub const PROTOCOL_FILE: &str = "protocol.json";
pub const COMMANDS_FILE: &str = "commands.json";

/// `protocol_name → command_id_hex → [Command]`, the `commands.json` shape.
pub type CommandTable = BTreeMap<String, BTreeMap<String, Vec<Command>>>;

/// Records read from a store, in deterministic traversal order.
#[derive(Debug, Default)]
pub struct StoreContents {
    pub protocols: Vec<Protocol>,
    /// Commands from `commands.json` files.
    pub commands: Vec<Command>,
    /// Commands from legacy per-command files.
    pub legacy_commands: Vec<LegacyCommand>,
}

/// A command read from a legacy per-command file, with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCommand {
    pub path: PathBuf,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    /// Read every group. Unreadable files are logged and skipped, and so are
    /// records that belong to a group other than the directory holding them.
    pub fn load(&self) -> StoreContents {
        let mut contents = StoreContents::default();
        let groups = match sorted_entries(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "template store does not exist yet");
                return contents;
            }
            Err(err) => {
                warn!(root = %self.root.display(), %err, "cannot list template store");
                return contents;
            }
        };
        for dir in groups.into_iter().filter(|path| path.is_dir()) {
            self.load_group(&dir, &mut contents);
        }
        contents
    }

    fn load_group(&self, dir: &Path, contents: &mut StoreContents) {
        let group = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let protocol_path = dir.join(PROTOCOL_FILE);
        let mut owner = group.clone();
        if protocol_path.is_file() {
            match read_protocol(&protocol_path) {
                Ok(protocol) if group_of(&protocol.header.name) != group => {
                    warn!(
                        dir = %dir.display(),
                        protocol = %protocol.header.name,
                        "skipping group: protocol name does not match its directory"
                    );
                    return;
                }
                Ok(protocol) => {
                    owner = protocol.header.name.clone();
                    contents.protocols.push(protocol);
                }
                Err(err) => warn!(%err, "skipping unreadable protocol file"),
            }
        }

        let commands_path = dir.join(COMMANDS_FILE);
        if commands_path.is_file() {
            match read_commands(&commands_path) {
                Ok(commands) => contents
                    .commands
                    .extend(commands.into_iter().filter(|c| belongs_to(c, &group, &commands_path))),
                Err(err) => warn!(%err, "skipping unreadable commands file"),
            }
        }

        let legacy = match legacy_files(dir) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(group = %group, %err, "cannot list group directory");
                return;
            }
        };
        for path in legacy {
            match read_legacy_command(&path, &owner) {
                Ok(command) if belongs_to(&command, &group, &path) => {
                    contents.legacy_commands.push(LegacyCommand { path, command });
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "skipping unreadable legacy command file"),
            }
        }
    }

    /// Rewrite `protocol.json` for the protocol's group.
    pub fn write_protocol(&self, protocol: &Protocol) -> Result<(), CatalogError> {
        let dir = self.group_dir(&protocol.header.group);
        create_dir(&dir)?;
        let record = Template::Protocol(protocol.clone());
        write_json(&dir.join(PROTOCOL_FILE), &record)
    }

    /// Rewrite `commands.json` for `group`; an empty table removes the file.
    pub fn write_commands(&self, group: &str, table: &CommandTable) -> Result<(), CatalogError> {
        let dir = self.group_dir(group);
        let path = dir.join(COMMANDS_FILE);
        let tagged: BTreeMap<&str, BTreeMap<&str, Vec<Template>>> = table
            .iter()
            .map(|(protocol, ids)| {
                let ids = ids
                    .iter()
                    .filter(|(_, list)| !list.is_empty())
                    .map(|(id, list)| {
                        let records = list.iter().cloned().map(Template::Command).collect();
                        (id.as_str(), records)
                    })
                    .collect::<BTreeMap<_, _>>();
                (protocol.as_str(), ids)
            })
            .filter(|(_, ids)| !ids.is_empty())
            .collect();
        if tagged.is_empty() {
            return remove_file(&path);
        }
        create_dir(&dir)?;
        write_json(&path, &tagged)
    }

    /// Delete legacy per-command files whose records now live in a
    /// `commands.json`. Files never read successfully are not passed here.
    pub fn remove_legacy_files(&self, paths: &[PathBuf]) -> Result<(), CatalogError> {
        for path in paths {
            remove_file(path)?;
            debug!(path = %path.display(), "removed legacy command file");
        }
        Ok(())
    }

    /// Remove the catalog files of `group`: commands first, protocol last.
    /// The directory goes too unless something unread is left in it.
    pub fn remove_group(&self, group: &str, legacy: &[PathBuf]) -> Result<(), CatalogError> {
        let dir = self.group_dir(group);
        remove_file(&dir.join(COMMANDS_FILE))?;
        self.remove_legacy_files(legacy)?;
        remove_file(&dir.join(PROTOCOL_FILE))?;
        self.prune_group_dir(group)
    }

    /// Remove the group directory when it is empty.
    pub fn prune_group_dir(&self, group: &str) -> Result<(), CatalogError> {
        let dir = self.group_dir(group);
        let is_empty = match fs::read_dir(&dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(CatalogError::Io { path: dir, source }),
        };
        if is_empty {
            fs::remove_dir(&dir).map_err(|source| CatalogError::Io { path: dir, source })?;
        }
        Ok(())
    }
}

fn read_protocol(path: &Path) -> Result<Protocol, CatalogError> {
    let mut value = read_value(path)?;
    if let Value::Object(map) = &mut value {
        map.entry("type").or_insert_with(|| Value::from("protocol"));
    }
    match from_value(path, value)? {
        Template::Protocol(protocol) => Ok(protocol),
        Template::Command(_) => Err(CatalogError::invalid(format!(
            "{} holds a command record",
            path.display()
        ))),
    }
}

fn read_commands(path: &Path) -> Result<Vec<Command>, CatalogError> {
    let value = read_value(path)?;
    let Value::Object(protocols) = value else {
        return Err(CatalogError::invalid(format!(
            "{} is not a protocol -> command-id mapping",
            path.display()
        )));
    };
    let mut commands = Vec::new();
    for (protocol_name, ids) in protocols {
        let Value::Object(ids) = ids else {
            warn!(path = %path.display(), protocol = %protocol_name, "skipping malformed command table");
            continue;
        };
        for (id, list) in ids {
            let Value::Array(list) = list else {
                warn!(path = %path.display(), id = %id, "skipping malformed command list");
                continue;
            };
            for record in list {
                match command_from_value(path, record, &protocol_name) {
                    Ok(command) => commands.push(command),
                    Err(err) => warn!(
                        %err,
                        id = %id,
                        "skipping unreadable command record; it is dropped when the group is next saved"
                    ),
                }
            }
        }
    }
    Ok(commands)
}

fn belongs_to(command: &Command, group: &str, path: &Path) -> bool {
    let owned = group_of(&command.protocol_name) == group;
    if !owned {
        warn!(
            path = %path.display(),
            command = %command.header.name,
            protocol = %command.protocol_name,
            "skipping command stored outside its protocol's group"
        );
    }
    owned
}

fn read_legacy_command(path: &Path, owner: &str) -> Result<Command, CatalogError> {
    let value = read_value(path)?;
    command_from_value(path, value, owner)
}

/// Decode a command record, filling the tag and owner when absent.
fn command_from_value(
    path: &Path,
    mut value: Value,
    protocol_name: &str,
) -> Result<Command, CatalogError> {
    if let Value::Object(map) = &mut value {
        map.entry("type").or_insert_with(|| Value::from("command"));
        let has_owner = map
            .get("protocol_name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());
        if !has_owner {
            map.insert("protocol_name".to_string(), Value::from(protocol_name));
        }
    }
    match from_value(path, value)? {
        Template::Command(command) => Ok(command),
        Template::Protocol(_) => Err(CatalogError::invalid(format!(
            "{} holds a protocol record where a command was expected",
            path.display()
        ))),
    }
}

fn read_value(path: &Path) -> Result<Value, CatalogError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn from_value(path: &Path, value: Value) -> Result<Template, CatalogError> {
    serde_json::from_value(value).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');
    fs::write(path, json).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create_dir(dir: &Path) -> Result<(), CatalogError> {
    fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn remove_file(path: &Path) -> Result<(), CatalogError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

/// `*.json` files of a group other than `protocol.json` / `commands.json`.
fn legacy_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name != PROTOCOL_FILE && name != COMMANDS_FILE
        })
        .collect())
}
