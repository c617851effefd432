//! Read-only parser for ELF files of both classes and byte orders.
//!
//! Decodes an in-memory byte buffer into a typed model of headers,
//! sections, segments, symbol tables, relocation tables, dynamic linking
//! tables, string tables and the GNU symbol-versioning records. Only the
//! file header and the section/program header tables are decoded up
//! front; everything else decodes on demand from the borrowed buffer,
//! and section content is always a zero-copy subslice of it.
//!
//! The 32- and 64-bit on-disk formats are structurally similar but not
//! interchangeable (field widths, field order and the relocation `info`
//! packing all differ), so they are modeled as two concrete types,
//! [`Elf32File`] and [`Elf64File`], with [`ElfFile`] as the
//! width-agnostic handle that promotes every query result to 64-bit
//! widths.
//!
//! # Usage
//!
//! ```
//! use elf_reader::ElfFile;
//!
//! fn list_sections(raw: &[u8]) {
//!     let elf = ElfFile::parse(raw).expect("valid ELF");
//!     for index in 1..elf.section_count() {
//!         if let Ok(name) = elf.section_name(index) {
//!             let header = elf.section_header(index).unwrap();
//!             let _ = (name, header.size);
//!         }
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod dynamic;
pub mod facade;
pub mod file;
pub mod header;
pub mod reader;
pub mod reloc;
pub mod section;
pub mod segment;
pub mod symbol;
pub mod version;

use core::fmt;

pub use dynamic::{DynamicEntry32, DynamicEntry64, DynamicTag32, DynamicTag64};
pub use facade::{
    DynamicEntryView, ElfFile, RelocationView, SectionView, SegmentView, SymbolView,
};
pub use file::{Elf32File, Elf64File};
pub use header::{
    Class, FileHeader32, FileHeader64, FileType, Machine, ELF_SIGNATURE,
};
pub use reader::{read_string_at_offset, Encoding};
pub use reloc::{Relocation32, Relocation64, RelocationInfo32, RelocationInfo64};
pub use section::{
    SectionFlags32, SectionFlags64, SectionHeader32, SectionHeader64, SectionType,
};
pub use segment::{ProgramHeader32, ProgramHeader64, SegmentFlags, SegmentType};
pub use symbol::{elf32_hash, Symbol32, Symbol64, SymbolInfo};
pub use version::{VersionDef, VersionDefAux, VersionNeed, VersionNeedAux};

/// Parses `raw` as whichever ELF class its identifier declares.
///
/// Shorthand for [`ElfFile::parse`].
///
/// # Errors
///
/// Returns a [`ParseError`] if the identifier, header or header tables
/// are malformed.
pub fn parse(raw: &[u8]) -> Result<ElfFile<'_>, ParseError> {
    ElfFile::parse(raw)
}

/// Everything that can go wrong while parsing or querying an ELF file.
///
/// Errors raised during the initial parse are fatal for that parse;
/// errors raised by a post-parse query are local to the queried table
/// and leave the parsed file usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The magic signature did not match; carries the word that was read.
    BadSignature(u32),
    /// The class byte is not a supported class, or disagrees with the
    /// parse entry point that was used.
    BadClass(u8),
    /// The encoding byte names neither byte order.
    BadEncoding(u8),
    /// The buffer is too small for the identifier or the file header.
    ShortBuffer,
    /// The section header table offset lies outside the buffer.
    BadSectionTableOffset(u64),
    /// The program header table offset lies outside the buffer.
    BadSegmentTableOffset(u64),
    /// The declared section header table does not fit in the buffer.
    ShortSectionTable,
    /// The declared program header table does not fit in the buffer.
    ShortSegmentTable,
    /// A section's content offset/size escapes the buffer.
    BadSectionBounds(u16),
    /// A segment's content offset/size escapes the buffer.
    BadSegmentBounds(u16),
    /// A section or segment index is out of range.
    InvalidIndex(u16),
    /// The null (index 0) section was queried where a real section is
    /// required.
    NullSection,
    /// The section is not a string table.
    NotStringTable(u16),
    /// The section is not a symbol table.
    NotSymbolTable(u16),
    /// The section is not a relocation table.
    NotRelocationTable(u16),
    /// The section is not a dynamic linking table.
    NotDynamicSection(u16),
    /// The section is not a GNU version requirement section.
    NotVersionRequirementSection(u16),
    /// The section is not a GNU version definition section.
    NotVersionDefinitionSection(u16),
    /// A string offset lies outside its table.
    InvalidOffset(u64),
    /// No NUL terminator was found between the offset and the end of the
    /// buffer.
    UnterminatedString(u64),
    /// A string table's content does not end in a NUL byte.
    UnterminatedTable,
    /// The dynamic table does not declare the version record count.
    MissingVersionCount,
    /// A fixed-layout record ran past the end of its buffer.
    Truncated,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature(got) => write!(f, "invalid ELF signature: 0x{got:08x}"),
            Self::BadClass(class) => write!(f, "invalid ELF class: {class}"),
            Self::BadEncoding(encoding) => {
                write!(f, "invalid encoding/endianness: {encoding}")
            }
            Self::ShortBuffer => write!(f, "insufficient size for an ELF file"),
            Self::BadSectionTableOffset(offset) => {
                write!(f, "invalid section header offset: 0x{offset:x}")
            }
            Self::BadSegmentTableOffset(offset) => {
                write!(f, "invalid program header offset: 0x{offset:x}")
            }
            Self::ShortSectionTable => write!(f, "section header table extends past the buffer"),
            Self::ShortSegmentTable => write!(f, "program header table extends past the buffer"),
            Self::BadSectionBounds(index) => {
                write!(f, "bad offset or size for section {index}")
            }
            Self::BadSegmentBounds(index) => {
                write!(f, "bad offset or size for segment {index}")
            }
            Self::InvalidIndex(index) => write!(f, "invalid section or segment index: {index}"),
            Self::NullSection => write!(f, "the null (0-index) section doesn't have a name"),
            Self::NotStringTable(index) => {
                write!(f, "section {index} is not a string table")
            }
            Self::NotSymbolTable(index) => {
                write!(f, "section {index} is not a symbol table")
            }
            Self::NotRelocationTable(index) => {
                write!(f, "section {index} is not a relocation table")
            }
            Self::NotDynamicSection(index) => {
                write!(f, "section {index} is not a dynamic linking section")
            }
            Self::NotVersionRequirementSection(index) => {
                write!(f, "section {index} is not a version requirement section")
            }
            Self::NotVersionDefinitionSection(index) => {
                write!(f, "section {index} is not a version definition section")
            }
            Self::InvalidOffset(offset) => write!(f, "invalid string offset: {offset}"),
            Self::UnterminatedString(offset) => {
                write!(f, "unterminated string starting at offset {offset}")
            }
            Self::UnterminatedTable => write!(f, "the string table wasn't null-terminated"),
            Self::MissingVersionCount => {
                write!(f, "the dynamic table didn't contain a version record count")
            }
            Self::Truncated => write!(f, "record extends past the end of its data"),
        }
    }
}
