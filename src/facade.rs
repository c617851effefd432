//! The width-agnostic file handle.
//!
//! [`ElfFile`] wraps either parsed-file type and promotes every field to
//! the 64-bit widths, so client code can treat both classes uniformly.
//! The two concrete types stay reachable through the enum variants for
//! callers that need class-specific detail; only the handle guarantees
//! uniform behavior, most visibly for the relocation `info` word, which
//! it re-packs from the 32-bit split into the 64-bit one.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::dynamic::{DynamicEntry32, DynamicEntry64, DynamicTag64};
use crate::file::{Elf32File, Elf64File};
use crate::header::{Class, FileType, Machine, CLASS_ELF64};
use crate::reader::Encoding;
use crate::reloc::{Relocation32, Relocation64, RelocationInfo64};
use crate::section::{SectionFlags64, SectionHeader32, SectionHeader64, SectionType};
use crate::segment::{ProgramHeader32, ProgramHeader64, SegmentFlags, SegmentType};
use crate::symbol::{Symbol32, Symbol64, SymbolInfo};
use crate::ParseError;

/// A section header with every field promoted to the 64-bit widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionView {
    /// Offset of the section's name in the section-names string table.
    pub name_offset: u32,
    /// Section type.
    pub section_type: SectionType,
    /// Section flags; bit meanings are identical in both classes.
    pub flags: SectionFlags64,
    /// Virtual address of the section in memory.
    pub virtual_address: u64,
    /// File offset of the section content.
    pub file_offset: u64,
    /// Size of the section content in bytes.
    pub size: u64,
    /// Index of an associated section.
    pub linked_index: u32,
    /// Extra information.
    pub info: u32,
    /// Required alignment.
    pub align: u64,
    /// Size of one entry, for sections holding fixed-size records.
    pub entry_size: u64,
}

impl From<SectionHeader32> for SectionView {
    fn from(h: SectionHeader32) -> Self {
        Self {
            name_offset: h.name_offset,
            section_type: h.section_type,
            flags: SectionFlags64::from_bits_retain(u64::from(h.flags.bits())),
            virtual_address: u64::from(h.virtual_address),
            file_offset: u64::from(h.file_offset),
            size: u64::from(h.size),
            linked_index: h.linked_index,
            info: h.info,
            align: u64::from(h.align),
            entry_size: u64::from(h.entry_size),
        }
    }
}

impl From<SectionHeader64> for SectionView {
    fn from(h: SectionHeader64) -> Self {
        Self {
            name_offset: h.name_offset,
            section_type: h.section_type,
            flags: h.flags,
            virtual_address: h.virtual_address,
            file_offset: h.file_offset,
            size: h.size,
            linked_index: h.linked_index,
            info: h.info,
            align: h.align,
            entry_size: h.entry_size,
        }
    }
}

impl fmt::Display for SectionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} section. {} bytes at address 0x{:x} (offset 0x{:x} in file). Linked to section {}. {}",
            self.section_type, self.size, self.virtual_address, self.file_offset,
            self.linked_index, self.flags
        )
    }
}

/// A program header with every field promoted to the 64-bit widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentView {
    /// Segment type.
    pub segment_type: SegmentType,
    /// Segment permission flags; bit meanings are identical in both
    /// classes.
    pub flags: SegmentFlags,
    /// File offset of the segment data.
    pub file_offset: u64,
    /// Virtual address of the segment.
    pub virtual_address: u64,
    /// Physical address of the segment.
    pub physical_address: u64,
    /// Size of the segment data in the file.
    pub file_size: u64,
    /// Size of the segment in memory.
    pub memory_size: u64,
    /// Required alignment.
    pub align: u64,
}

impl From<ProgramHeader32> for SegmentView {
    fn from(h: ProgramHeader32) -> Self {
        Self {
            segment_type: h.segment_type,
            flags: h.flags,
            file_offset: u64::from(h.file_offset),
            virtual_address: u64::from(h.virtual_address),
            physical_address: u64::from(h.physical_address),
            file_size: u64::from(h.file_size),
            memory_size: u64::from(h.memory_size),
            align: u64::from(h.align),
        }
    }
}

impl From<ProgramHeader64> for SegmentView {
    fn from(h: ProgramHeader64) -> Self {
        Self {
            segment_type: h.segment_type,
            flags: h.flags,
            file_offset: h.file_offset,
            virtual_address: h.virtual_address,
            physical_address: h.physical_address,
            file_size: h.file_size,
            memory_size: h.memory_size,
            align: h.align,
        }
    }
}

impl fmt::Display for SegmentView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segment at address 0x{:x} (offset 0x{:x} in file). {} bytes in memory, {} in the file, alignment 0x{:x}. {}",
            self.segment_type, self.virtual_address, self.file_offset, self.memory_size,
            self.file_size, self.align, self.flags
        )
    }
}

/// A symbol with value and size promoted to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolView {
    /// Offset of the symbol's name in the linked string table.
    pub name_offset: u32,
    /// Packed binding and type.
    pub info: SymbolInfo,
    /// Visibility byte.
    pub other: u8,
    /// Index of the section the symbol is defined relative to.
    pub section_index: u16,
    /// Symbol value.
    pub value: u64,
    /// Size of the named entity in bytes.
    pub size: u64,
}

impl From<Symbol32> for SymbolView {
    fn from(s: Symbol32) -> Self {
        Self {
            name_offset: s.name_offset,
            info: s.info,
            other: s.other,
            section_index: s.section_index,
            value: u64::from(s.value),
            size: u64::from(s.size),
        }
    }
}

impl From<Symbol64> for SymbolView {
    fn from(s: Symbol64) -> Self {
        Self {
            name_offset: s.name_offset,
            info: s.info,
            other: s.other,
            section_index: s.section_index,
            value: s.value,
            size: s.size,
        }
    }
}

impl fmt::Display for SymbolView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} byte {} symbol. Value: {}, associated section: {}",
            self.size, self.info, self.value, self.section_index
        )
    }
}

/// A relocation with its `info` word in the 64-bit packing, whichever
/// class it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationView {
    /// Location the relocation applies to.
    pub offset: u64,
    /// Packed type and symbol index, 64-bit split.
    pub info: RelocationInfo64,
    /// The addend, or 0 for records from a `Rel` table.
    pub addend: i64,
}

impl From<Relocation32> for RelocationView {
    fn from(r: Relocation32) -> Self {
        // Re-pack the 8/24 split into the 64-bit 32/32 split so that the
        // type and symbol index extract the same way for both classes.
        let info =
            (u64::from(r.info.symbol_index()) << 32) | u64::from(r.info.relocation_type());
        Self {
            offset: u64::from(r.offset),
            info: RelocationInfo64(info),
            addend: i64::from(r.addend),
        }
    }
}

impl From<Relocation64> for RelocationView {
    fn from(r: Relocation64) -> Self {
        Self {
            offset: r.offset,
            info: r.info,
            addend: r.addend,
        }
    }
}

impl fmt::Display for RelocationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relocation at address 0x{:016x} with addend {}, {}",
            self.offset, self.addend, self.info
        )
    }
}

/// A dynamic entry with tag and value promoted to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntryView {
    /// Entry tag.
    pub tag: DynamicTag64,
    /// Entry value.
    pub value: u64,
}

impl From<DynamicEntry32> for DynamicEntryView {
    fn from(e: DynamicEntry32) -> Self {
        Self {
            tag: DynamicTag64(i64::from(e.tag.0)),
            value: u64::from(e.value),
        }
    }
}

impl From<DynamicEntry64> for DynamicEntryView {
    fn from(e: DynamicEntry64) -> Self {
        Self {
            tag: e.tag,
            value: e.value,
        }
    }
}

impl fmt::Display for DynamicEntryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, value 0x{:x}", self.tag, self.value)
    }
}

/// A parsed ELF file of either class.
///
/// This is the handle to code against when the class is not known up
/// front. Every query promotes its results to the 64-bit widths; match
/// on the variants to reach the class-specific records instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElfFile<'a> {
    /// A 32-bit class file.
    Elf32(Elf32File<'a>),
    /// A 64-bit class file.
    Elf64(Elf64File<'a>),
}

impl<'a> ElfFile<'a> {
    /// Parses `raw` as whichever class its identifier declares.
    ///
    /// # Errors
    ///
    /// [`ParseError::ShortBuffer`] if fewer than 5 bytes are available
    /// to read the class from, or whatever the class-specific parse
    /// surfaces.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ParseError> {
        if raw.len() < 5 {
            return Err(ParseError::ShortBuffer);
        }
        if raw[4] == CLASS_ELF64 {
            Ok(Self::Elf64(Elf64File::parse(raw)?))
        } else {
            Ok(Self::Elf32(Elf32File::parse(raw)?))
        }
    }

    /// The class of the parsed file.
    #[must_use]
    pub fn class(&self) -> Class {
        match self {
            Self::Elf32(_) => Class::Elf32,
            Self::Elf64(_) => Class::Elf64,
        }
    }

    /// The byte order the file's multi-byte fields are stored in.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        match self {
            Self::Elf32(f) => f.encoding(),
            Self::Elf64(f) => f.encoding(),
        }
    }

    /// The object file type from the header.
    #[must_use]
    pub fn file_type(&self) -> FileType {
        match self {
            Self::Elf32(f) => f.header.file_type,
            Self::Elf64(f) => f.header.file_type,
        }
    }

    /// The machine type from the header.
    #[must_use]
    pub fn machine(&self) -> Machine {
        match self {
            Self::Elf32(f) => f.header.machine,
            Self::Elf64(f) => f.header.machine,
        }
    }

    /// Number of entries in the section header table.
    #[must_use]
    pub fn section_count(&self) -> u16 {
        match self {
            Self::Elf32(f) => f.section_count(),
            Self::Elf64(f) => f.section_count(),
        }
    }

    /// Number of entries in the program header table.
    #[must_use]
    pub fn segment_count(&self) -> u16 {
        match self {
            Self::Elf32(f) => f.segment_count(),
            Self::Elf64(f) => f.segment_count(),
        }
    }

    /// Returns the name of the section at `index`.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::section_name`].
    pub fn section_name(&self, index: u16) -> Result<String, ParseError> {
        match self {
            Self::Elf32(f) => f.section_name(index),
            Self::Elf64(f) => f.section_name(index),
        }
    }

    /// Returns the content of the section at `index`.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::section_content`].
    pub fn section_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        match self {
            Self::Elf32(f) => f.section_content(index),
            Self::Elf64(f) => f.section_content(index),
        }
    }

    /// Returns the file-backed content of the segment at `index`.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::segment_content`].
    pub fn segment_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        match self {
            Self::Elf32(f) => f.segment_content(index),
            Self::Elf64(f) => f.segment_content(index),
        }
    }

    /// Returns the promoted section header at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range.
    pub fn section_header(&self, index: u16) -> Result<SectionView, ParseError> {
        match self {
            Self::Elf32(f) => f
                .sections
                .get(usize::from(index))
                .copied()
                .map(SectionView::from)
                .ok_or(ParseError::InvalidIndex(index)),
            Self::Elf64(f) => f
                .sections
                .get(usize::from(index))
                .copied()
                .map(SectionView::from)
                .ok_or(ParseError::InvalidIndex(index)),
        }
    }

    /// Returns the promoted program header at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range.
    pub fn program_header(&self, index: u16) -> Result<SegmentView, ParseError> {
        match self {
            Self::Elf32(f) => f
                .segments
                .get(usize::from(index))
                .copied()
                .map(SegmentView::from)
                .ok_or(ParseError::InvalidIndex(index)),
            Self::Elf64(f) => f
                .segments
                .get(usize::from(index))
                .copied()
                .map(SegmentView::from)
                .ok_or(ParseError::InvalidIndex(index)),
        }
    }

    /// Returns true if the section at `index` is a string table.
    #[must_use]
    pub fn is_string_table(&self, index: u16) -> bool {
        match self {
            Self::Elf32(f) => f.is_string_table(index),
            Self::Elf64(f) => f.is_string_table(index),
        }
    }

    /// Reads the string at `offset` in the string table at `index`.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::string_at`].
    pub fn string_at(&self, index: u16, offset: u32) -> Result<String, ParseError> {
        match self {
            Self::Elf32(f) => f.string_at(index, offset),
            Self::Elf64(f) => f.string_at(index, offset),
        }
    }

    /// Returns every string in the string table at `index`.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::string_table`].
    pub fn string_table(&self, index: u16) -> Result<Vec<String>, ParseError> {
        match self {
            Self::Elf32(f) => f.string_table(index),
            Self::Elf64(f) => f.string_table(index),
        }
    }

    /// Returns true if the section at `index` is a symbol table.
    #[must_use]
    pub fn is_symbol_table(&self, index: u16) -> bool {
        match self {
            Self::Elf32(f) => f.is_symbol_table(index),
            Self::Elf64(f) => f.is_symbol_table(index),
        }
    }

    /// Decodes the symbol table at `index`, promoting each record.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::symbol_table`].
    pub fn symbols(&self, index: u16) -> Result<(Vec<SymbolView>, Vec<String>), ParseError> {
        match self {
            Self::Elf32(f) => {
                let (symbols, names) = f.symbol_table(index)?;
                Ok((symbols.into_iter().map(SymbolView::from).collect(), names))
            }
            Self::Elf64(f) => {
                let (symbols, names) = f.symbol_table(index)?;
                Ok((symbols.into_iter().map(SymbolView::from).collect(), names))
            }
        }
    }

    /// Returns true if the section at `index` is a relocation table.
    #[must_use]
    pub fn is_relocation_table(&self, index: u16) -> bool {
        match self {
            Self::Elf32(f) => f.is_relocation_table(index),
            Self::Elf64(f) => f.is_relocation_table(index),
        }
    }

    /// Decodes the relocation table at `index`. Records from a 32-bit
    /// file arrive with their `info` word re-packed into the 64-bit
    /// layout.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::relocation_table`].
    pub fn relocations(&self, index: u16) -> Result<Vec<RelocationView>, ParseError> {
        match self {
            Self::Elf32(f) => Ok(f
                .relocation_table(index)?
                .into_iter()
                .map(RelocationView::from)
                .collect()),
            Self::Elf64(f) => Ok(f
                .relocation_table(index)?
                .into_iter()
                .map(RelocationView::from)
                .collect()),
        }
    }

    /// Returns true if the section at `index` is a dynamic linking table.
    #[must_use]
    pub fn is_dynamic_section(&self, index: u16) -> bool {
        match self {
            Self::Elf32(f) => f.is_dynamic_section(index),
            Self::Elf64(f) => f.is_dynamic_section(index),
        }
    }

    /// Decodes the dynamic table at `index`, promoting each entry.
    /// Callers stop at the first tag-0 entry.
    ///
    /// # Errors
    ///
    /// See [`Elf32File::dynamic_table`].
    pub fn dynamic_entries(&self, index: u16) -> Result<Vec<DynamicEntryView>, ParseError> {
        match self {
            Self::Elf32(f) => Ok(f
                .dynamic_table(index)?
                .into_iter()
                .map(DynamicEntryView::from)
                .collect()),
            Self::Elf64(f) => Ok(f
                .dynamic_table(index)?
                .into_iter()
                .map(DynamicEntryView::from)
                .collect()),
        }
    }

    /// Re-runs header and header-table decoding against the current raw
    /// buffer. See [`Elf32File::reparse`].
    ///
    /// # Errors
    ///
    /// Whatever the class-specific re-parse surfaces.
    pub fn reparse(&mut self) -> Result<(), ParseError> {
        match self {
            Self::Elf32(f) => f.reparse(),
            Self::Elf64(f) => f.reparse(),
        }
    }
}
