//! Section headers, section content access, and string tables.
//!
//! The section header table is decoded eagerly at parse time; section
//! *content* is always a bounds-checked subslice of the raw buffer,
//! resolved at access time so that one corrupt section never poisons the
//! rest of the file.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::file::{Elf32File, Elf64File};
use crate::reader::{read_string_at_offset, subslice, Encoding};
use crate::ParseError;

/// The type of a section, from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionType(pub u32);

impl SectionType {
    /// Unused entry (the index-0 null section).
    pub const NULL: Self = Self(0);
    /// Program-defined contents.
    pub const BITS: Self = Self(1);
    /// Symbol table.
    pub const SYMBOL_TABLE: Self = Self(2);
    /// String table.
    pub const STRING_TABLE: Self = Self(3);
    /// Relocation entries with addends.
    pub const RELA: Self = Self(4);
    /// Symbol hash table.
    pub const HASH: Self = Self(5);
    /// Dynamic linking table.
    pub const DYNAMIC: Self = Self(6);
    /// Note section.
    pub const NOTE: Self = Self(7);
    /// Uninitialized (zero-fill) memory.
    pub const UNINITIALIZED: Self = Self(8);
    /// Relocation entries without addends.
    pub const REL: Self = Self(9);
    /// Reserved.
    pub const RESERVED: Self = Self(10);
    /// Dynamic loader symbol table.
    pub const DYNAMIC_LOADER_SYMBOL_TABLE: Self = Self(11);
    /// GNU symbol hash table.
    pub const GNU_HASH: Self = Self(0x6fff_fff5);
    /// GNU version definitions.
    pub const GNU_VERSION_DEFINITION: Self = Self(0x6fff_fffd);
    /// GNU version requirements.
    pub const GNU_VERSION_REQUIREMENT: Self = Self(0x6fff_fffe);
    /// GNU version symbol indices.
    pub const GNU_VERSION_SYMBOL: Self = Self(0x6fff_ffff);
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NULL => write!(f, "unused"),
            Self::BITS => write!(f, "bits"),
            Self::SYMBOL_TABLE => write!(f, "symbol table"),
            Self::STRING_TABLE => write!(f, "string table"),
            Self::RELA => write!(f, "relocation entries with addends"),
            Self::HASH => write!(f, "symbol hash table"),
            Self::DYNAMIC => write!(f, "dynamic linking table"),
            Self::NOTE => write!(f, "note"),
            Self::UNINITIALIZED => write!(f, "uninitialized memory"),
            Self::REL => write!(f, "relocation entries"),
            Self::RESERVED => write!(f, "reserved"),
            Self::DYNAMIC_LOADER_SYMBOL_TABLE => write!(f, "dynamic loader symbol table"),
            Self::GNU_HASH => write!(f, "GNU symbol hash table"),
            Self::GNU_VERSION_DEFINITION => write!(f, "GNU version definitions"),
            Self::GNU_VERSION_REQUIREMENT => write!(f, "GNU version requirements"),
            Self::GNU_VERSION_SYMBOL => write!(f, "GNU version symbol indices"),
            Self(t) if (0x7000_0000..0x8000_0000).contains(&t) => {
                write!(f, "processor-specific section type: 0x{t:x}")
            }
            Self(t) if (0x6000_0000..0x7000_0000).contains(&t) => {
                write!(f, "OS-specific section type: 0x{t:x}")
            }
            Self(t) => write!(f, "invalid section type: 0x{t:x}"),
        }
    }
}

bitflags! {
    /// Section flags of a 32-bit class file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags32: u32 {
        /// The section is writable at run time.
        const WRITE = 1;
        /// The section occupies memory in the program image.
        const ALLOC = 2;
        /// The section holds executable instructions.
        const EXECINSTR = 4;
    }
}

bitflags! {
    /// Section flags of a 64-bit class file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags64: u64 {
        /// The section is writable at run time.
        const WRITE = 1;
        /// The section occupies memory in the program image.
        const ALLOC = 2;
        /// The section holds executable instructions.
        const EXECINSTR = 4;
    }
}

fn write_section_flags(f: &mut fmt::Formatter<'_>, bits: u64) -> fmt::Result {
    let not = |set: bool| if set { "" } else { "not " };
    write!(
        f,
        "{}writable, {}allocated, {}executable",
        not(bits & 1 != 0),
        not(bits & 2 != 0),
        not(bits & 4 != 0)
    )
}

impl SectionFlags32 {
    /// Returns true if the writable flag is set.
    #[must_use]
    pub fn writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns true if the section occupies memory at run time.
    #[must_use]
    pub fn allocated(self) -> bool {
        self.contains(Self::ALLOC)
    }

    /// Returns true if the executable flag is set.
    #[must_use]
    pub fn executable(self) -> bool {
        self.contains(Self::EXECINSTR)
    }
}

impl SectionFlags64 {
    /// Returns true if the writable flag is set.
    #[must_use]
    pub fn writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns true if the section occupies memory at run time.
    #[must_use]
    pub fn allocated(self) -> bool {
        self.contains(Self::ALLOC)
    }

    /// Returns true if the executable flag is set.
    #[must_use]
    pub fn executable(self) -> bool {
        self.contains(Self::EXECINSTR)
    }
}

impl fmt::Display for SectionFlags32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_section_flags(f, u64::from(self.bits()))
    }
}

impl fmt::Display for SectionFlags64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_section_flags(f, self.bits())
    }
}

/// One entry of a 32-bit class section header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader32 {
    /// Offset of the section's name in the section-names string table.
    pub name_offset: u32,
    /// Section type.
    pub section_type: SectionType,
    /// Section flags.
    pub flags: SectionFlags32,
    /// Virtual address of the section in memory (0 if not loaded).
    pub virtual_address: u32,
    /// File offset of the section content.
    pub file_offset: u32,
    /// Size of the section content in bytes.
    pub size: u32,
    /// Index of an associated section; meaning depends on the type.
    pub linked_index: u32,
    /// Extra information; meaning depends on the type.
    pub info: u32,
    /// Required alignment.
    pub align: u32,
    /// Size of one entry, for sections holding fixed-size records.
    pub entry_size: u32,
}

impl SectionHeader32 {
    pub(crate) const SIZE: usize = 40;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            name_offset: en.read_u32(data, 0),
            section_type: SectionType(en.read_u32(data, 4)),
            flags: SectionFlags32::from_bits_retain(en.read_u32(data, 8)),
            virtual_address: en.read_u32(data, 12),
            file_offset: en.read_u32(data, 16),
            size: en.read_u32(data, 20),
            linked_index: en.read_u32(data, 24),
            info: en.read_u32(data, 28),
            align: en.read_u32(data, 32),
            entry_size: en.read_u32(data, 36),
        }
    }
}

impl fmt::Display for SectionHeader32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} section. {} bytes at address 0x{:x} (offset 0x{:x} in file). Linked to section {}. {}",
            self.section_type, self.size, self.virtual_address, self.file_offset,
            self.linked_index, self.flags
        )
    }
}

/// One entry of a 64-bit class section header table.
///
/// The flags, address, offset, size, alignment and entry size widen to
/// 8 bytes; the linked index and info stay 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader64 {
    /// Offset of the section's name in the section-names string table.
    pub name_offset: u32,
    /// Section type.
    pub section_type: SectionType,
    /// Section flags.
    pub flags: SectionFlags64,
    /// Virtual address of the section in memory (0 if not loaded).
    pub virtual_address: u64,
    /// File offset of the section content.
    pub file_offset: u64,
    /// Size of the section content in bytes.
    pub size: u64,
    /// Index of an associated section; meaning depends on the type.
    pub linked_index: u32,
    /// Extra information; meaning depends on the type.
    pub info: u32,
    /// Required alignment.
    pub align: u64,
    /// Size of one entry, for sections holding fixed-size records.
    pub entry_size: u64,
}

impl SectionHeader64 {
    pub(crate) const SIZE: usize = 64;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            name_offset: en.read_u32(data, 0),
            section_type: SectionType(en.read_u32(data, 4)),
            flags: SectionFlags64::from_bits_retain(en.read_u64(data, 8)),
            virtual_address: en.read_u64(data, 16),
            file_offset: en.read_u64(data, 24),
            size: en.read_u64(data, 32),
            linked_index: en.read_u32(data, 40),
            info: en.read_u32(data, 44),
            align: en.read_u64(data, 48),
            entry_size: en.read_u64(data, 56),
        }
    }
}

impl fmt::Display for SectionHeader64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} section. {} bytes at address 0x{:x} (offset 0x{:x} in file). Linked to section {}. {}",
            self.section_type, self.size, self.virtual_address, self.file_offset,
            self.linked_index, self.flags
        )
    }
}

/// Splits string-table content into its strings.
///
/// The table must end in a NUL byte; the returned sequence includes the
/// leading empty string that offset 0 of a well-formed table holds.
fn split_string_table(content: &[u8]) -> Result<Vec<String>, ParseError> {
    let Some((&0, body)) = content.split_last() else {
        return Err(ParseError::UnterminatedTable);
    };
    Ok(body
        .split(|&b| b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect())
}

impl<'a> Elf32File<'a> {
    /// Returns the content of the section at `index` as a slice of the
    /// raw buffer.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range, and
    /// [`ParseError::BadSectionBounds`] if the header's offset/size escape
    /// the buffer.
    pub fn section_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        let header = self
            .sections
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        subslice(
            self.raw,
            u64::from(header.file_offset),
            u64::from(header.size),
        )
        .ok_or(ParseError::BadSectionBounds(index))
    }

    /// Returns the name of the section at `index`, looked up in the
    /// section-names table.
    ///
    /// # Errors
    ///
    /// [`ParseError::NullSection`] for index 0 (the null section has no
    /// name), plus any error from reading the names table.
    pub fn section_name(&self, index: u16) -> Result<String, ParseError> {
        if index == 0 {
            return Err(ParseError::NullSection);
        }
        let header = *self
            .sections
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        let names = self.section_content(self.header.section_names_table)?;
        let name = read_string_at_offset(header.name_offset, names)?;
        Ok(String::from_utf8_lossy(name).into_owned())
    }

    /// Returns true if the section at `index` is a string table.
    #[must_use]
    pub fn is_string_table(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::STRING_TABLE)
    }

    /// Reads the string at `offset` in the string table held by the
    /// section at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotStringTable`] if the section is not a string
    /// table, plus any error from the string lookup itself.
    pub fn string_at(&self, index: u16, offset: u32) -> Result<String, ParseError> {
        if usize::from(index) >= self.sections.len() {
            return Err(ParseError::InvalidIndex(index));
        }
        if !self.is_string_table(index) {
            return Err(ParseError::NotStringTable(index));
        }
        let content = self.section_content(index)?;
        let bytes = read_string_at_offset(offset, content)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns every string in the string table at `index`, including the
    /// leading empty string.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotStringTable`] for a non-string-table section and
    /// [`ParseError::UnterminatedTable`] if the content does not end in a
    /// NUL byte.
    pub fn string_table(&self, index: u16) -> Result<Vec<String>, ParseError> {
        if !self.is_string_table(index) {
            return Err(ParseError::NotStringTable(index));
        }
        split_string_table(self.section_content(index)?)
    }
}

impl<'a> Elf64File<'a> {
    /// Returns the content of the section at `index` as a slice of the
    /// raw buffer.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range, and
    /// [`ParseError::BadSectionBounds`] if the header's offset/size escape
    /// the buffer (including offset + size overflow).
    pub fn section_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        let header = self
            .sections
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        subslice(self.raw, header.file_offset, header.size)
            .ok_or(ParseError::BadSectionBounds(index))
    }

    /// Returns the name of the section at `index`, looked up in the
    /// section-names table.
    ///
    /// # Errors
    ///
    /// [`ParseError::NullSection`] for index 0 (the null section has no
    /// name), plus any error from reading the names table.
    pub fn section_name(&self, index: u16) -> Result<String, ParseError> {
        if index == 0 {
            return Err(ParseError::NullSection);
        }
        let header = *self
            .sections
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        let names = self.section_content(self.header.section_names_table)?;
        let name = read_string_at_offset(header.name_offset, names)?;
        Ok(String::from_utf8_lossy(name).into_owned())
    }

    /// Returns true if the section at `index` is a string table.
    #[must_use]
    pub fn is_string_table(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::STRING_TABLE)
    }

    /// Reads the string at `offset` in the string table held by the
    /// section at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotStringTable`] if the section is not a string
    /// table, plus any error from the string lookup itself.
    pub fn string_at(&self, index: u16, offset: u32) -> Result<String, ParseError> {
        if usize::from(index) >= self.sections.len() {
            return Err(ParseError::InvalidIndex(index));
        }
        if !self.is_string_table(index) {
            return Err(ParseError::NotStringTable(index));
        }
        let content = self.section_content(index)?;
        let bytes = read_string_at_offset(offset, content)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns every string in the string table at `index`, including the
    /// leading empty string.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotStringTable`] for a non-string-table section and
    /// [`ParseError::UnterminatedTable`] if the content does not end in a
    /// NUL byte.
    pub fn string_table(&self, index: u16) -> Result<Vec<String>, ParseError> {
        if !self.is_string_table(index) {
            return Err(ParseError::NotStringTable(index));
        }
        split_string_table(self.section_content(index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::tests::{build_image32, build_image64, SectionSpec};

    /// Sections: null, .strtab (the names table itself at index 1).
    fn image_with_names(en: Encoding) -> alloc::vec::Vec<u8> {
        let names = SectionSpec {
            name_offset: 1,
            section_type: SectionType::STRING_TABLE.0,
            content: b"\0.strtab\0.text\0".to_vec(),
            ..SectionSpec::default()
        };
        let text = SectionSpec {
            name_offset: 9,
            section_type: SectionType::BITS.0,
            flags: 2 | 4,
            content: b"\x90\x90\x90\x90".to_vec(),
            ..SectionSpec::default()
        };
        build_image32(en, 1, &[SectionSpec::null(), names, text], &[])
    }

    #[test]
    fn section_names_round_trip() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.section_name(1).unwrap(), ".strtab");
        assert_eq!(elf.section_name(2).unwrap(), ".text");

        // The name must decode to exactly the bytes the raw lookup yields.
        let names = elf
            .section_content(elf.header.section_names_table)
            .unwrap();
        let raw = read_string_at_offset(elf.sections[2].name_offset, names).unwrap();
        assert_eq!(elf.section_name(2).unwrap().as_bytes(), raw);
    }

    #[test]
    fn null_section_has_no_name() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.section_name(0), Err(ParseError::NullSection));
    }

    #[test]
    fn name_of_out_of_range_section() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.section_name(9), Err(ParseError::InvalidIndex(9)));
    }

    #[test]
    fn section_content_matches() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.section_content(2).unwrap(), b"\x90\x90\x90\x90");
    }

    #[test]
    fn section_content_bounds_checked() {
        let mut buf = image_with_names(Encoding::Little);
        let shdr_pos = 52 + 2 * SectionHeader32::SIZE + 20; // section 2 size field
        buf[shdr_pos..shdr_pos + 4].copy_from_slice(&0xffff_0000u32.to_le_bytes());
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(
            elf.section_content(2),
            Err(ParseError::BadSectionBounds(2))
        );
        // Other sections stay readable.
        assert!(elf.section_content(1).is_ok());
    }

    #[test]
    fn string_table_includes_leading_empty_string() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        let strings = elf.string_table(1).unwrap();
        assert_eq!(strings, &["", ".strtab", ".text"]);
    }

    #[test]
    fn string_table_requires_trailing_nul() {
        let names = SectionSpec {
            name_offset: 1,
            section_type: SectionType::STRING_TABLE.0,
            content: b"\0oops".to_vec(),
            ..SectionSpec::default()
        };
        let buf = build_image32(Encoding::Little, 1, &[SectionSpec::null(), names], &[]);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.string_table(1), Err(ParseError::UnterminatedTable));
    }

    #[test]
    fn string_table_type_guard() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert!(elf.is_string_table(1));
        assert!(!elf.is_string_table(2));
        assert!(!elf.is_string_table(200));
        assert_eq!(elf.string_table(2), Err(ParseError::NotStringTable(2)));
        assert_eq!(elf.string_at(2, 0), Err(ParseError::NotStringTable(2)));
    }

    #[test]
    fn string_at_offset_within_table() {
        let buf = image_with_names(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.string_at(1, 1).unwrap(), ".strtab");
        assert_eq!(elf.string_at(1, 0).unwrap(), "");
    }

    #[test]
    fn big_endian_sections_decode_identically() {
        let le = image_with_names(Encoding::Little);
        let be = image_with_names(Encoding::Big);
        let elf_le = Elf32File::parse(&le).unwrap();
        let elf_be = Elf32File::parse(&be).unwrap();
        assert_eq!(elf_le.sections, elf_be.sections);
        assert_eq!(elf_be.section_name(2).unwrap(), ".text");
    }

    #[test]
    fn sections_decode_64bit() {
        let names = SectionSpec {
            name_offset: 1,
            section_type: SectionType::STRING_TABLE.0,
            content: b"\0.strtab\0".to_vec(),
            ..SectionSpec::default()
        };
        let buf = build_image64(Encoding::Little, 1, &[SectionSpec::null(), names], &[]);
        let elf = Elf64File::parse(&buf).unwrap();
        assert_eq!(elf.section_name(1).unwrap(), ".strtab");
        assert_eq!(elf.string_table(1).unwrap(), &["", ".strtab"]);
    }

    #[test]
    fn flags_display() {
        let flags = SectionFlags32::WRITE | SectionFlags32::ALLOC;
        assert_eq!(flags.to_string(), "writable, allocated, not executable");
        assert!(flags.writable());
        assert!(flags.allocated());
        assert!(!flags.executable());
    }

    #[test]
    fn type_labels() {
        assert_eq!(SectionType::STRING_TABLE.to_string(), "string table");
        assert_eq!(
            SectionType(0x6000_0001).to_string(),
            "OS-specific section type: 0x60000001"
        );
        assert_eq!(
            SectionType(0x7000_0001).to_string(),
            "processor-specific section type: 0x70000001"
        );
        assert_eq!(
            SectionType(0x8000_0001).to_string(),
            "invalid section type: 0x80000001"
        );
    }
}
