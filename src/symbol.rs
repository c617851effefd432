//! Symbol table records and the classic ELF symbol hash.
//!
//! The 32- and 64-bit symbol records carry the same fields in a different
//! order: the 32-bit form keeps value and size as 4-byte fields in the
//! middle, the 64-bit form moves the 8-byte value and size to the end.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::file::{Elf32File, Elf64File};
use crate::reader::{read_string_at_offset, Encoding};
use crate::section::SectionType;
use crate::ParseError;

/// The packed info byte of a symbol: binding in the high four bits,
/// symbol type in the low four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo(pub u8);

impl SymbolInfo {
    /// The binding class (high four bits): 0 local, 1 weak, 2 global,
    /// 10-12 OS-specific, 13-15 processor-specific.
    #[must_use]
    pub fn binding(self) -> u8 {
        self.0 >> 4
    }

    /// The symbol type (low four bits): 0 none, 1 object, 2 function,
    /// 3 section, 4 file, 10-12 OS-specific, 13-15 processor-specific.
    #[must_use]
    pub fn symbol_type(self) -> u8 {
        self.0 & 0xf
    }
}

impl fmt::Display for SymbolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol_type() {
            0 => write!(f, "no type")?,
            1 => write!(f, "object")?,
            2 => write!(f, "function")?,
            3 => write!(f, "section")?,
            4 => write!(f, "file")?,
            t @ 10..=12 => write!(f, "os-specific type {t}")?,
            t @ 13..=15 => write!(f, "processor-specific type {t}")?,
            t => write!(f, "unknown type {t}")?,
        }
        match self.binding() {
            0 => write!(f, ", local binding"),
            1 => write!(f, ", weak binding"),
            2 => write!(f, ", global binding"),
            b @ 10..=12 => write!(f, ", os-specific binding {b}"),
            b @ 13..=15 => write!(f, ", processor-specific binding {b}"),
            b => write!(f, ", unknown binding {b}"),
        }
    }
}

/// One entry of a 32-bit class symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol32 {
    /// Offset of the symbol's name in the linked string table.
    pub name_offset: u32,
    /// Symbol value (usually an address).
    pub value: u32,
    /// Size of the named entity in bytes.
    pub size: u32,
    /// Packed binding and type.
    pub info: SymbolInfo,
    /// Visibility byte.
    pub other: u8,
    /// Index of the section the symbol is defined relative to.
    pub section_index: u16,
}

impl Symbol32 {
    pub(crate) const SIZE: usize = 16;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            name_offset: en.read_u32(data, 0),
            value: en.read_u32(data, 4),
            size: en.read_u32(data, 8),
            info: SymbolInfo(data[12]),
            other: data[13],
            section_index: en.read_u16(data, 14),
        }
    }
}

impl fmt::Display for Symbol32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} byte {} symbol. Value: {}, associated section: {}",
            self.size, self.info, self.value, self.section_index
        )
    }
}

/// One entry of a 64-bit class symbol table.
///
/// Field order differs from [`Symbol32`]: the info, other and section
/// index bytes come right after the name offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol64 {
    /// Offset of the symbol's name in the linked string table.
    pub name_offset: u32,
    /// Packed binding and type.
    pub info: SymbolInfo,
    /// Visibility byte.
    pub other: u8,
    /// Index of the section the symbol is defined relative to.
    pub section_index: u16,
    /// Symbol value (usually an address).
    pub value: u64,
    /// Size of the named entity in bytes.
    pub size: u64,
}

impl Symbol64 {
    pub(crate) const SIZE: usize = 24;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            name_offset: en.read_u32(data, 0),
            info: SymbolInfo(data[4]),
            other: data[5],
            section_index: en.read_u16(data, 6),
            value: en.read_u64(data, 8),
            size: en.read_u64(data, 16),
        }
    }
}

impl fmt::Display for Symbol64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} byte {} symbol. Value: {}, associated section: {}",
            self.size, self.info, self.value, self.section_index
        )
    }
}

/// The classic ELF hash over a symbol name.
///
/// Iterates until the first NUL byte (or the end of `data`); the empty
/// input hashes to 0. This is the function `SHT_HASH` tables are built
/// with.
#[must_use]
pub fn elf32_hash(data: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &c in data {
        if c == 0 {
            break;
        }
        hash = (hash << 4).wrapping_add(u32::from(c));
        let high = hash & 0xf000_0000;
        if high != 0 {
            hash ^= high >> 24;
        }
        hash &= !high;
    }
    hash
}

fn is_symbol_table_type(section_type: SectionType) -> bool {
    matches!(
        section_type,
        SectionType::SYMBOL_TABLE | SectionType::DYNAMIC_LOADER_SYMBOL_TABLE
    )
}

impl<'a> Elf32File<'a> {
    /// Returns true if the section at `index` is a symbol table (regular
    /// or dynamic-loader).
    #[must_use]
    pub fn is_symbol_table(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| is_symbol_table_type(s.section_type))
    }

    /// Decodes the symbol table at `index` along with the symbols' names.
    ///
    /// The two returned vectors are index-aligned. A name offset of 0
    /// yields an empty string without consulting the string table.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotSymbolTable`] for a section of the wrong type;
    /// otherwise whatever the content and string lookups surface.
    pub fn symbol_table(&self, index: u16) -> Result<(Vec<Symbol32>, Vec<String>), ParseError> {
        if !self.is_symbol_table(index) {
            return Err(ParseError::NotSymbolTable(index));
        }
        let content = self.section_content(index)?;
        let name_table = self.section_content(self.sections[usize::from(index)].linked_index as u16)?;
        let count = content.len() / Symbol32::SIZE;
        let mut symbols = Vec::with_capacity(count);
        for i in 0..count {
            symbols.push(Symbol32::parse(&content[i * Symbol32::SIZE..], self.encoding));
        }
        let names = symbol_names(symbols.iter().map(|s| s.name_offset), name_table)?;
        Ok((symbols, names))
    }
}

impl<'a> Elf64File<'a> {
    /// Returns true if the section at `index` is a symbol table (regular
    /// or dynamic-loader).
    #[must_use]
    pub fn is_symbol_table(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| is_symbol_table_type(s.section_type))
    }

    /// Decodes the symbol table at `index` along with the symbols' names.
    ///
    /// The two returned vectors are index-aligned. A name offset of 0
    /// yields an empty string without consulting the string table.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotSymbolTable`] for a section of the wrong type;
    /// otherwise whatever the content and string lookups surface.
    pub fn symbol_table(&self, index: u16) -> Result<(Vec<Symbol64>, Vec<String>), ParseError> {
        if !self.is_symbol_table(index) {
            return Err(ParseError::NotSymbolTable(index));
        }
        let content = self.section_content(index)?;
        let name_table = self.section_content(self.sections[usize::from(index)].linked_index as u16)?;
        let count = content.len() / Symbol64::SIZE;
        let mut symbols = Vec::with_capacity(count);
        for i in 0..count {
            symbols.push(Symbol64::parse(&content[i * Symbol64::SIZE..], self.encoding));
        }
        let names = symbol_names(symbols.iter().map(|s| s.name_offset), name_table)?;
        Ok((symbols, names))
    }
}

/// Resolves each name offset against the linked string table.
fn symbol_names(
    offsets: impl Iterator<Item = u32>,
    name_table: &[u8],
) -> Result<Vec<String>, ParseError> {
    let mut names = Vec::new();
    for offset in offsets {
        if offset == 0 {
            names.push(String::new());
            continue;
        }
        let bytes = read_string_at_offset(offset, name_table)?;
        names.push(String::from_utf8_lossy(bytes).into_owned());
    }
    Ok(names)
}
