//! Template resolution for a canonical byte stream.
//!
//! The protocol family places the command discriminator at byte 3 with an
//! optional follow qualifier right after it. Resolution order:
//!
//! 1. command id `B[3]`: an exact follow match returns immediately;
//! 2. otherwise the first empty-follow candidate, else the first candidate;
//! 3. the same search with `B[0]` as the command id;
//! 4. any command whose id equals `B[0]` or `B[3]`;
//! 5. a protocol whose id equals `B[0]`.
//!
//! Groups are scanned in lexicographic protocol-name order, so ties across
//! groups resolve deterministically.

use crate::hex::layout::DIGITS_PER_BYTE;
use crate::hex::reader::{byte_at, byte_len};

use super::index::CatalogIndex;
use super::model::{Command, Template};

/// Byte index of the command discriminator.
pub const COMMAND_ID_OFFSET: usize = 3;

pub fn match_template(index: &CatalogIndex, hex: &str) -> Option<Template> {
    let hex = hex.to_ascii_uppercase();
    let len = byte_len(&hex);

    if len > COMMAND_ID_OFFSET {
        if let Some(command) = match_command_at(index, &hex, COMMAND_ID_OFFSET) {
            return Some(Template::Command(command.clone()));
        }
    }
    if len > 0 {
        if let Some(command) = match_command_at(index, &hex, 0) {
            return Some(Template::Command(command.clone()));
        }
    }

    let first = byte_at(&hex, 0)?;
    let discriminator = byte_at(&hex, COMMAND_ID_OFFSET);
    if let Some(command) = index
        .commands()
        .find(|c| c.command_id() == first || Some(c.command_id()) == discriminator)
    {
        return Some(Template::Command(command.clone()));
    }

    index
        .protocols()
        .find(|p| p.header.protocol_id_hex == first)
        .map(|p| Template::Protocol(p.clone()))
}

fn match_command_at<'a>(index: &'a CatalogIndex, hex: &str, at: usize) -> Option<&'a Command> {
    let command_id = byte_at(hex, at)?;
    let rest = hex.get((at + 1) * DIGITS_PER_BYTE..).unwrap_or("");

    let mut candidates: Vec<&Command> = Vec::new();
    for ids in index.protocol_commands().values() {
        let Some(list) = ids.get(command_id) else {
            continue;
        };
        if let Some(exact) = list.iter().find(|c| follow_matches(&c.follow, rest)) {
            return Some(exact);
        }
        candidates.extend(list.iter());
    }
    candidates
        .iter()
        .find(|c| c.follow.is_empty())
        .or(candidates.first())
        .copied()
}

/// A non-empty follow matches when the bytes after the command id start
/// with it; an empty follow matches only when nothing follows.
fn follow_matches(follow: &str, rest: &str) -> bool {
    if follow.is_empty() {
        rest.is_empty()
    } else {
        rest.starts_with(follow)
    }
}
