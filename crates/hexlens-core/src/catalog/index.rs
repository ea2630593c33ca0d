//! In-memory indices over the loaded catalog.

use std::collections::{BTreeMap, BTreeSet};

use super::error::CatalogError;
use super::model::{Command, Protocol, Template, group_of};
use super::store::CommandTable;

/// `(protocol_name, command_id_hex, name, follow)`, unique per command.
type CommandIdentity = (String, String, String, String);

fn identity(command: &Command) -> CommandIdentity {
    (
        command.protocol_name.clone(),
        command.command_id().to_string(),
        command.header.name.clone(),
        command.follow.clone(),
    )
}

#[derive(Debug, Default, Clone)]
pub struct CatalogIndex {
    /// `group → Protocol`.
    protocols: BTreeMap<String, Protocol>,
    /// `protocol_name → command_id_hex → [Command]`, insertion ordered lists.
    protocol_commands: CommandTable,
    /// `name → Command`, latest wins.
    commands: BTreeMap<String, Command>,
    /// When each command was last loaded or saved; higher is later.
    stamps: BTreeMap<CommandIdentity, u64>,
    next_stamp: u64,
}

impl CatalogIndex {
    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    pub fn protocol_commands(&self) -> &CommandTable {
        &self.protocol_commands
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn command_by_name(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn protocol_by_group(&self, group: &str) -> Option<&Protocol> {
        self.protocols.get(group)
    }

    /// Protocol by name, compared case-insensitively through its group.
    pub fn protocol_by_name(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(&group_of(name))
    }

    pub fn insert_protocol(&mut self, protocol: Protocol) {
        self.protocols.insert(protocol.header.group.clone(), protocol);
    }

    /// Append a loaded command unless the same `(name, follow)` is present.
    pub fn insert_loaded_command(&mut self, command: Command) -> bool {
        let list = self
            .protocol_commands
            .entry(command.protocol_name.clone())
            .or_default()
            .entry(command.command_id().to_string())
            .or_default();
        if list
            .iter()
            .any(|c| c.header.name == command.header.name && c.follow == command.follow)
        {
            return false;
        }
        // Same as `self.stamp(&command)`, with disjoint field borrows.
        self.next_stamp += 1;
        self.stamps.insert(identity(&command), self.next_stamp);
        list.push(command);
        true
    }

    fn stamp(&mut self, command: &Command) {
        self.next_stamp += 1;
        self.stamps.insert(identity(command), self.next_stamp);
    }

    /// Command tables of every protocol stored in `group`.
    pub fn group_commands(&self, group: &str) -> CommandTable {
        self.protocol_commands
            .iter()
            .filter(|(protocol, _)| group_of(protocol) == group)
            .map(|(protocol, ids)| (protocol.clone(), ids.clone()))
            .collect()
    }

    /// Replace the command tables of `group`.
    pub fn set_group_commands(&mut self, group: &str, table: CommandTable) {
        self.protocol_commands
            .retain(|protocol, _| group_of(protocol) != group);
        for (protocol, mut ids) in table {
            ids.retain(|_, list| !list.is_empty());
            if !ids.is_empty() {
                self.protocol_commands.insert(protocol, ids);
            }
        }
    }

    /// Remove a protocol and every command stored in its group.
    pub fn remove_group(&mut self, group: &str) -> Option<Protocol> {
        self.set_group_commands(group, CommandTable::new());
        self.rebuild_names();
        self.protocols.remove(group)
    }

    /// Record `command` as the latest holder of its name.
    pub fn note_command(&mut self, command: &Command) {
        self.stamp(command);
        self.commands
            .insert(command.header.name.clone(), command.clone());
    }

    /// Rebuild `name → Command` from the command tables. Among commands
    /// sharing a name the most recently loaded or saved one wins.
    pub fn rebuild_names(&mut self) {
        let mut latest: BTreeMap<String, (u64, &Command)> = BTreeMap::new();
        let mut live = BTreeSet::new();
        for command in self.protocol_commands.values().flat_map(|ids| ids.values()).flatten() {
            let key = identity(command);
            let stamp = self.stamps.get(&key).copied().unwrap_or(0);
            live.insert(key);
            let slot = latest
                .entry(command.header.name.clone())
                .or_insert((stamp, command));
            if stamp >= slot.0 {
                *slot = (stamp, command);
            }
        }
        self.commands = latest
            .into_iter()
            .map(|(name, (_, command))| (name, command.clone()))
            .collect();
        self.stamps.retain(|key, _| live.contains(key));
    }

    /// Commands of `group` whose id is `id`, optionally restricted by name.
    pub fn commands_in_group(&self, group: &str, id: &str, name: Option<&str>) -> Vec<&Command> {
        self.protocol_commands
            .iter()
            .filter(|(protocol, _)| group_of(protocol) == group)
            .filter_map(|(_, ids)| ids.get(id))
            .flatten()
            .filter(|command| name.is_none_or(|name| command.header.name == name))
            .collect()
    }

    /// Every template addressed by `key`.
    ///
    /// Accepted forms: `<group>/<id>` (the group's protocol when its id
    /// matches, otherwise every command with that id), `<group>/<id>/<name>`
    /// and a bare protocol name.
    pub fn resolve(&self, key: &str) -> Vec<Template> {
        let parts: Vec<&str> = key.trim().split('/').collect();
        match parts.as_slice() {
            [name] => self
                .protocol_by_name(name)
                .map(|p| vec![Template::Protocol(p.clone())])
                .unwrap_or_default(),
            [group, id] => {
                let group = group.to_lowercase();
                let id = id.to_ascii_uppercase();
                if let Some(protocol) = self
                    .protocols
                    .get(&group)
                    .filter(|p| p.header.protocol_id_hex == id)
                {
                    return vec![Template::Protocol(protocol.clone())];
                }
                self.commands_in_group(&group, &id, None)
                    .into_iter()
                    .map(|c| Template::Command(c.clone()))
                    .collect()
            }
            [group, id, name] => self
                .commands_in_group(&group.to_lowercase(), &id.to_ascii_uppercase(), Some(*name))
                .into_iter()
                .map(|c| Template::Command(c.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The single template addressed by `key`.
    pub fn resolve_one(&self, key: &str) -> Result<Template, CatalogError> {
        let mut found = self.resolve(key);
        match found.len() {
            0 => Err(CatalogError::unknown(key)),
            1 => Ok(found.remove(0)),
            count => Err(CatalogError::AmbiguousKey {
                key: key.to_string(),
                count,
            }),
        }
    }

    /// Every template: protocols by group, each followed by its commands.
    pub fn templates(&self) -> Vec<Template> {
        let mut out = Vec::new();
        let mut groups: Vec<String> = self.protocols.keys().cloned().collect();
        for protocol in self.protocol_commands.keys() {
            let group = group_of(protocol);
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups.sort();
        for group in groups {
            if let Some(protocol) = self.protocols.get(&group) {
                out.push(Template::Protocol(protocol.clone()));
            }
            for (_, ids) in self
                .protocol_commands
                .iter()
                .filter(|(protocol, _)| group_of(protocol) == group)
            {
                out.extend(ids.values().flatten().cloned().map(Template::Command));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
            + self
                .protocol_commands
                .values()
                .flat_map(|ids| ids.values())
                .map(Vec::len)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
