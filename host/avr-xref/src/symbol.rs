//! Parsing of `objdump -t` symbol table lines.
//!
//! A line looks like
//!
//! ```text
//! 00000100 g     F .text	00000010 myFunc
//! ```
//!
//! i.e. address, a seven character flag field, section, size and name.
//! Anything that does not fit this shape (headers, blank lines, truncated
//! records) is rejected with `None`.

/// Symbol binding, flag position 1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Binding {
    Local,
    Global,
    UniqueGlobal,
    /// `!`: objdump prints this for symbols that are both local and global.
    LocalAndGlobal,
}

/// Flag position 5.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Indirect {
    None,
    Reference,
    Function,
}

/// Flag position 6.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DebugInfo {
    None,
    Debugging,
    Dynamic,
}

/// Flag position 7.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SymbolType {
    Normal,
    Function,
    File,
    Object,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SymbolFlags {
    pub binding: Binding,
    pub weak: bool,
    pub constructor: bool,
    pub warning: bool,
    pub indirect: Indirect,
    pub debug: DebugInfo,
    pub symbol_type: SymbolType,
}

impl SymbolFlags {
    pub const WIDTH: usize = 7;

    /// Decode the flag field. Every position is checked against its own
    /// alphabet; a single stray character rejects the field.
    pub fn parse(field: &[u8]) -> Option<Self> {
        let &[binding, weak, constructor, warning, indirect, debug, symbol_type] = field else {
            return None;
        };
        let binding = match binding {
            b'l' => Binding::Local,
            b'g' => Binding::Global,
            b'u' => Binding::UniqueGlobal,
            b'!' => Binding::LocalAndGlobal,
            _ => return None,
        };
        let indirect = match indirect {
            b' ' => Indirect::None,
            b'I' => Indirect::Reference,
            b'i' => Indirect::Function,
            _ => return None,
        };
        let debug = match debug {
            b' ' => DebugInfo::None,
            b'd' => DebugInfo::Debugging,
            b'D' => DebugInfo::Dynamic,
            _ => return None,
        };
        let symbol_type = match symbol_type {
            b' ' => SymbolType::Normal,
            b'F' => SymbolType::Function,
            b'f' => SymbolType::File,
            b'O' => SymbolType::Object,
            _ => return None,
        };
        Some(Self {
            binding,
            weak: single_flag(weak, b'w')?,
            constructor: single_flag(constructor, b'C')?,
            warning: single_flag(warning, b'W')?,
            indirect,
            debug,
            symbol_type,
        })
    }
}

fn single_flag(c: u8, set: u8) -> Option<bool> {
    match c {
        b' ' => Some(false),
        c if c == set => Some(true),
        _ => None,
    }
}

/// One parsed symbol table record, borrowing from the input line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SymbolLine<'a> {
    /// Byte address as printed by objdump.
    pub address: u64,
    pub flags: SymbolFlags,
    pub section: &'a str,
    pub size: u64,
    pub name: &'a str,
}

impl<'a> SymbolLine<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut cursor = Cursor { rest: line };

        let _ = cursor.whitespace();
        let address = cursor.hex()?;
        cursor.whitespace()?;
        let flags = SymbolFlags::parse(cursor.take(SymbolFlags::WIDTH)?.as_bytes())?;
        cursor.whitespace()?;
        let section = cursor.token(is_section_char)?;
        cursor.whitespace()?;
        let size = cursor.hex()?;
        cursor.whitespace()?;
        let name = cursor.token(is_name_char)?;

        Some(Self {
            address,
            flags,
            section,
            size,
            name,
        })
    }
}

fn is_section_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | ':' | '*' | '.')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '*' | '.')
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    /// Non-empty run of characters matching `pred`.
    fn token(&mut self, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let end = self.rest.find(|c| !pred(c)).unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }

    fn hex(&mut self) -> Option<u64> {
        let digits = self.token(|c| c.is_ascii_hexdigit())?;
        u64::from_str_radix(digits, 16).ok()
    }

    /// At least one whitespace character, vertical tab included.
    fn whitespace(&mut self) -> Option<()> {
        self.token(|c| c.is_ascii_whitespace() || c == '\x0b').map(drop)
    }

    fn take(&mut self, n: usize) -> Option<&'a str> {
        let taken = self.rest.get(..n)?;
        self.rest = &self.rest[n..];
        Some(taken)
    }
}
