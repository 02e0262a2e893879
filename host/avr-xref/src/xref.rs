//! The cross-reference listing: one `<kind> 0x<word address> <label>` line per
//! symbol in the code section.

use crate::symbol::{SymbolLine, SymbolType};
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Write};
use std::str::FromStr;

/// Only symbols in this section end up in the listing.
pub const TEXT_SECTION: &str = ".text";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum XrefKind {
    /// Function entry point.
    Code,
    /// Anything else in the code section: jump targets, tables, etc.
    Jump,
}

impl XrefKind {
    pub fn tag(self) -> char {
        match self {
            XrefKind::Code => 'c',
            XrefKind::Jump => 'j',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'c' => Some(XrefKind::Code),
            'j' => Some(XrefKind::Jump),
            _ => None,
        }
    }
}

impl Display for XrefKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct XrefEntry {
    pub kind: XrefKind,
    /// Program memory word address (byte address / 2).
    pub address: u64,
    pub label: String,
}

impl XrefEntry {
    /// `None` for symbols outside [`TEXT_SECTION`].
    pub fn from_symbol(symbol: &SymbolLine<'_>) -> Option<Self> {
        if symbol.section != TEXT_SECTION {
            return None;
        }
        let kind = match symbol.flags.symbol_type {
            SymbolType::Function | SymbolType::File => XrefKind::Code,
            SymbolType::Normal | SymbolType::Object => XrefKind::Jump,
        };
        Some(Self {
            kind,
            address: symbol.address / 2,
            label: symbol.name.to_string(),
        })
    }
}

impl Display for XrefEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} 0x{:x} {}", self.kind, self.address, self.label)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParseXrefError {
    MissingField(&'static str),
    UnknownKind(String),
    MissingHexPrefix(String),
    InvalidAddress(String),
}

impl Display for ParseXrefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseXrefError::MissingField(field) => write!(f, "missing {field}"),
            ParseXrefError::UnknownKind(kind) => write!(f, "unknown kind {kind:?}"),
            ParseXrefError::MissingHexPrefix(addr) => {
                write!(f, "address {addr:?} does not start with 0x")
            }
            ParseXrefError::InvalidAddress(addr) => write!(f, "invalid address {addr:?}"),
        }
    }
}

impl std::error::Error for ParseXrefError {}

impl FromStr for XrefEntry {
    type Err = ParseXrefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_ascii_whitespace();

        let kind = fields.next().ok_or(ParseXrefError::MissingField("kind"))?;
        let mut tag = kind.chars();
        let kind = match (tag.next(), tag.next()) {
            (Some(tag), None) => XrefKind::from_tag(tag),
            _ => None,
        }
        .ok_or_else(|| ParseXrefError::UnknownKind(kind.to_string()))?;

        let address = fields
            .next()
            .ok_or(ParseXrefError::MissingField("address"))?;
        let digits = address
            .strip_prefix("0x")
            .ok_or_else(|| ParseXrefError::MissingHexPrefix(address.to_string()))?;
        let address = u64::from_str_radix(digits, 16)
            .map_err(|_| ParseXrefError::InvalidAddress(address.to_string()))?;

        let label = fields.next().ok_or(ParseXrefError::MissingField("label"))?;

        Ok(Self {
            kind,
            address,
            label: label.to_string(),
        })
    }
}

/// Read back a listing, skipping blank lines.
pub fn read_xref<R: BufRead>(reader: R) -> eyre::Result<Vec<XrefEntry>> {
    let mut entries = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = line
            .parse::<XrefEntry>()
            .map_err(|e| eyre::eyre!("xref line {}: {e}", i + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct XrefStats {
    /// Lines received from objdump.
    pub lines: usize,
    /// Lines that parsed as symbol table records.
    pub symbols: usize,
    /// Entries written to the listing.
    pub entries: usize,
}

/// Turns symbol table lines into listing lines as they arrive.
pub struct XrefWriter<W: Write> {
    out: W,
    stats: XrefStats,
}

impl<W: Write> XrefWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stats: XrefStats::default(),
        }
    }

    pub fn feed(&mut self, line: &str) -> io::Result<()> {
        self.stats.lines += 1;
        let Some(symbol) = SymbolLine::parse(line) else {
            tracing::trace!("skipping {line:?}");
            return Ok(());
        };
        self.stats.symbols += 1;
        if let Some(entry) = XrefEntry::from_symbol(&symbol) {
            writeln!(self.out, "{entry}")?;
            self.stats.entries += 1;
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<XrefStats> {
        self.out.flush()?;
        Ok(self.stats)
    }
}
