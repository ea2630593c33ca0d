//! Template records as stored on disk.
//!
//! Protocols and Commands share a header and are discriminated by the
//! `type` tag (`"protocol"` / `"command"`).

use serde::{Deserialize, Serialize};

use crate::decode::layout::saved_type;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl std::str::FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            other => Err(format!("unknown endianness '{other}' (expected little or big)")),
        }
    }
}

/// Positional typed slot inside a template.
///
/// # Examples
/// ```
/// use hexlens_core::{Endian, Field};
///
/// let field = Field::new("name", "char.ascii", 2, 5, Endian::Little);
/// assert_eq!(field.length(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub start_pos: usize,
    pub end_pos: usize,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub description: String,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        field_type: impl Into<String>,
        start_pos: usize,
        end_pos: usize,
        endian: Endian,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            start_pos,
            end_pos,
            endian,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Byte count of the inclusive span.
    pub fn length(&self) -> usize {
        self.end_pos.saturating_sub(self.start_pos) + 1
    }

    /// Type string in its saved form (length suffix for non-integer bases).
    pub fn saved_type(&self) -> String {
        saved_type(&self.field_type, self.length())
    }
}

/// Attributes shared by Protocols and Commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateHeader {
    pub name: String,
    pub protocol_id_hex: String,
    #[serde(default)]
    pub protocol_id_dec: Option<u64>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl TemplateHeader {
    pub fn new(name: impl Into<String>, protocol_id_hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol_id_hex: protocol_id_hex.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    #[serde(flatten)]
    pub header: TemplateHeader,
}

impl Protocol {
    /// # Examples
    /// ```
    /// use hexlens_core::Protocol;
    ///
    /// let proto = Protocol::new("TestProto", "AA");
    /// assert_eq!(proto.header.name, "TestProto");
    /// ```
    pub fn new(name: impl Into<String>, protocol_id_hex: impl Into<String>) -> Self {
        Self {
            header: TemplateHeader::new(name, protocol_id_hex),
        }
    }
}

/// A child template scoped to one Protocol; `protocol_id_hex` holds the
/// command identifier byte(s).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(flatten)]
    pub header: TemplateHeader,
    #[serde(default)]
    pub protocol_name: String,
    #[serde(default)]
    pub follow: String,
}

impl Command {
    pub fn new(
        protocol_name: impl Into<String>,
        name: impl Into<String>,
        command_id_hex: impl Into<String>,
    ) -> Self {
        Self {
            header: TemplateHeader::new(name, command_id_hex),
            protocol_name: protocol_name.into(),
            follow: String::new(),
        }
    }

    pub fn with_follow(mut self, follow: impl Into<String>) -> Self {
        self.follow = follow.into();
        self
    }

    pub fn command_id(&self) -> &str {
        &self.header.protocol_id_hex
    }
}

/// A Protocol or Command record with its field definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Template {
    Protocol(Protocol),
    Command(Command),
}

impl Template {
    pub fn header(&self) -> &TemplateHeader {
        match self {
            Self::Protocol(p) => &p.header,
            Self::Command(c) => &c.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut TemplateHeader {
        match self {
            Self::Protocol(p) => &mut p.header,
            Self::Command(c) => &mut c.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn id(&self) -> &str {
        &self.header().protocol_id_hex
    }

    pub fn fields(&self) -> &[Field] {
        &self.header().fields
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Command(_) => "command",
        }
    }

    /// Storage partition: the lowercased owning protocol name.
    pub fn group(&self) -> String {
        match self {
            Self::Protocol(p) => group_of(&p.header.name),
            Self::Command(c) => group_of(&c.protocol_name),
        }
    }

    /// `<group>/<id>` key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.group(), self.id())
    }

    /// Key that addresses this template uniquely (`<group>/<id>/<name>` for
    /// commands).
    pub fn full_key(&self) -> String {
        match self {
            Self::Protocol(_) => self.key(),
            Self::Command(c) => format!("{}/{}", self.key(), c.header.name),
        }
    }
}

impl From<Protocol> for Template {
    fn from(value: Protocol) -> Self {
        Self::Protocol(value)
    }
}

impl From<Command> for Template {
    fn from(value: Command) -> Self {
        Self::Command(value)
    }
}

/// Storage group for a protocol name.
pub fn group_of(protocol_name: &str) -> String {
    protocol_name.to_lowercase()
}
