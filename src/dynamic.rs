//! Dynamic linking table entries.
//!
//! A dynamic section is an array of (tag, value) pairs terminated by a
//! tag-0 entry. The section size may cover more records than the table
//! logically holds, so decoding surfaces every record and consumers stop
//! at the terminator. Some variants keep meaningful data past it, which
//! is why nothing is trimmed here.

use alloc::vec::Vec;
use core::fmt;

use crate::file::{Elf32File, Elf64File};
use crate::reader::Encoding;
use crate::section::SectionType;
use crate::ParseError;

/// Classification shared by both tag widths; 64-bit tags are classified
/// by their low 32 bits, which is where every defined tag lives.
fn write_tag_label(f: &mut fmt::Formatter<'_>, v: u32) -> fmt::Result {
    match v {
        0 => write!(f, "end of dynamic array"),
        1 => write!(f, "needed library name"),
        2 => write!(f, "PLT relocations size"),
        3 => write!(f, "PLT global offset table"),
        4 => write!(f, "symbol hash table address"),
        5 => write!(f, "string table address"),
        6 => write!(f, "symbol table address"),
        7 => write!(f, "relocation (rela) table address"),
        8 => write!(f, "relocation (rela) table size"),
        9 => write!(f, "relocation (rela) entry size"),
        10 => write!(f, "string table size"),
        11 => write!(f, "symbol table entry size"),
        12 => write!(f, "initialization function address"),
        13 => write!(f, "termination function address"),
        14 => write!(f, "shared object name"),
        15 => write!(f, "library search path"),
        16 => write!(f, "use alternate symbol resolution algorithm"),
        17 => write!(f, "relocation (rel) table address"),
        18 => write!(f, "relocation (rel) table size"),
        19 => write!(f, "relocation (rel) entry size"),
        20 => write!(f, "PLT relocation type"),
        21 => write!(f, "debug value"),
        22 => write!(f, "no read-only relocations allowed"),
        23 => write!(f, "PLT relocations address"),
        24 => write!(f, "process relocations now"),
        25 => write!(f, "initialization function array address"),
        26 => write!(f, "termination function array address"),
        27 => write!(f, "initialization function array size"),
        28 => write!(f, "termination function array size"),
        0x6fff_fef5 => write!(f, "GNU hash table address"),
        0x6fff_fff0 => write!(f, "version symbol table address"),
        0x6fff_fffc => write!(f, "version definition table address"),
        0x6fff_fffd => write!(f, "number of version definition table entries"),
        0x6fff_fffe => write!(f, "version dependency table address"),
        0x6fff_ffff => write!(f, "number of version dependency table entries"),
        v if (0x6000_0000..0x7000_0000).contains(&v) => {
            write!(f, "OS-specific dynamic entry 0x{v:08x}")
        }
        v if (0x7000_0000..0x8000_0000).contains(&v) => {
            write!(f, "processor-specific dynamic entry 0x{v:08x}")
        }
        v => write!(f, "unknown dynamic entry 0x{v:08x}"),
    }
}

/// The tag of a 32-bit dynamic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicTag32(pub u32);

impl DynamicTag32 {
    /// End of the dynamic array.
    pub const NULL: Self = Self(0);
    /// Offset of a needed library's name in the dynamic string table.
    pub const NEEDED: Self = Self(1);
    /// Address of the dynamic string table.
    pub const STRING_TABLE: Self = Self(5);
    /// Size of the dynamic string table in bytes.
    pub const STRING_TABLE_SIZE: Self = Self(10);
    /// Offset of the shared object's own name.
    pub const SHARED_OBJECT_NAME: Self = Self(14);
    /// Offset of the library search path string.
    pub const LIBRARY_SEARCH_PATH: Self = Self(15);
    /// Number of entries in the GNU version definition table.
    pub const VERSION_DEFINITION_COUNT: Self = Self(0x6fff_fffd);
    /// Number of entries in the GNU version requirement table.
    pub const VERSION_REQUIREMENT_COUNT: Self = Self(0x6fff_ffff);
}

impl fmt::Display for DynamicTag32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tag_label(f, self.0)
    }
}

/// The tag of a 64-bit dynamic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicTag64(pub i64);

impl DynamicTag64 {
    /// End of the dynamic array.
    pub const NULL: Self = Self(0);
    /// Offset of a needed library's name in the dynamic string table.
    pub const NEEDED: Self = Self(1);
    /// Address of the dynamic string table.
    pub const STRING_TABLE: Self = Self(5);
    /// Size of the dynamic string table in bytes.
    pub const STRING_TABLE_SIZE: Self = Self(10);
    /// Offset of the shared object's own name.
    pub const SHARED_OBJECT_NAME: Self = Self(14);
    /// Offset of the library search path string.
    pub const LIBRARY_SEARCH_PATH: Self = Self(15);
    /// Number of entries in the GNU version definition table.
    pub const VERSION_DEFINITION_COUNT: Self = Self(0x6fff_fffd);
    /// Number of entries in the GNU version requirement table.
    pub const VERSION_REQUIREMENT_COUNT: Self = Self(0x6fff_ffff);
}

impl fmt::Display for DynamicTag64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tag_label(f, self.0 as u32)
    }
}

/// One entry of a 32-bit dynamic section. Whether the value is a number
/// or a virtual address depends on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry32 {
    /// Entry tag.
    pub tag: DynamicTag32,
    /// Entry value.
    pub value: u32,
}

impl DynamicEntry32 {
    pub(crate) const SIZE: usize = 8;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            tag: DynamicTag32(en.read_u32(data, 0)),
            value: en.read_u32(data, 4),
        }
    }
}

impl fmt::Display for DynamicEntry32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, value 0x{:08x}", self.tag, self.value)
    }
}

/// One entry of a 64-bit dynamic section. Whether the value is a number
/// or a virtual address depends on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry64 {
    /// Entry tag.
    pub tag: DynamicTag64,
    /// Entry value.
    pub value: u64,
}

impl DynamicEntry64 {
    pub(crate) const SIZE: usize = 16;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            tag: DynamicTag64(en.read_i64(data, 0)),
            value: en.read_u64(data, 8),
        }
    }
}

impl fmt::Display for DynamicEntry64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, value 0x{:x}", self.tag, self.value)
    }
}

impl<'a> Elf32File<'a> {
    /// Returns true if the section at `index` is a dynamic linking table.
    #[must_use]
    pub fn is_dynamic_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::DYNAMIC)
    }

    /// Decodes the dynamic table at `index`.
    ///
    /// Every record the section size covers is returned, including any
    /// past the tag-0 terminator; callers stop at the terminator.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotDynamicSection`] for a section of the wrong type,
    /// plus any content access error.
    pub fn dynamic_table(&self, index: u16) -> Result<Vec<DynamicEntry32>, ParseError> {
        if !self.is_dynamic_section(index) {
            return Err(ParseError::NotDynamicSection(index));
        }
        let content = self.section_content(index)?;
        let count = content.len() / DynamicEntry32::SIZE;
        Ok((0..count)
            .map(|i| DynamicEntry32::parse(&content[i * DynamicEntry32::SIZE..], self.encoding))
            .collect())
    }
}

impl<'a> Elf64File<'a> {
    /// Returns true if the section at `index` is a dynamic linking table.
    #[must_use]
    pub fn is_dynamic_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::DYNAMIC)
    }

    /// Decodes the dynamic table at `index`.
    ///
    /// Every record the section size covers is returned, including any
    /// past the tag-0 terminator; callers stop at the terminator.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotDynamicSection`] for a section of the wrong type,
    /// plus any content access error.
    pub fn dynamic_table(&self, index: u16) -> Result<Vec<DynamicEntry64>, ParseError> {
        if !self.is_dynamic_section(index) {
            return Err(ParseError::NotDynamicSection(index));
        }
        let content = self.section_content(index)?;
        let count = content.len() / DynamicEntry64::SIZE;
        Ok((0..count)
            .map(|i| DynamicEntry64::parse(&content[i * DynamicEntry64::SIZE..], self.encoding))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::file::tests::{build_image32, put_u32, put_u64, SectionSpec};

    pub(crate) fn dyn32_bytes(en: Encoding, tag: u32, value: u32) -> [u8; 8] {
        let mut b = [0u8; 8];
        put_u32(&mut b, 0, tag, en);
        put_u32(&mut b, 4, value, en);
        b
    }

    pub(crate) fn dyn64_bytes(en: Encoding, tag: i64, value: u64) -> [u8; 16] {
        let mut b = [0u8; 16];
        put_u64(&mut b, 0, tag as u64, en);
        put_u64(&mut b, 8, value, en);
        b
    }

    fn image_with_dynamic(en: Encoding) -> Vec<u8> {
        let mut content = Vec::new();
        content.extend_from_slice(&dyn32_bytes(en, 1, 0x10)); // needed library
        content.extend_from_slice(&dyn32_bytes(en, 5, 0x8000)); // string table address
        content.extend_from_slice(&dyn32_bytes(en, 10, 0x40)); // string table size
        content.extend_from_slice(&dyn32_bytes(en, 0, 0)); // terminator
        content.extend_from_slice(&dyn32_bytes(en, 0x6fff_fef5, 0x1234)); // past terminator
        let dynamic = SectionSpec {
            section_type: SectionType::DYNAMIC.0,
            entry_size: DynamicEntry32::SIZE as u64,
            content,
            ..SectionSpec::default()
        };
        build_image32(en, 0, &[SectionSpec::null(), dynamic], &[])
    }

    #[test]
    fn decode_dynamic_table() {
        let buf = image_with_dynamic(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert!(elf.is_dynamic_section(1));
        let entries = elf.dynamic_table(1).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].tag, DynamicTag32::NEEDED);
        assert_eq!(entries[0].value, 0x10);
        assert_eq!(entries[1].tag, DynamicTag32::STRING_TABLE);
        assert_eq!(entries[2].tag, DynamicTag32::STRING_TABLE_SIZE);
    }

    #[test]
    fn entries_past_terminator_are_surfaced() {
        let buf = image_with_dynamic(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        let entries = elf.dynamic_table(1).unwrap();
        let terminator = entries
            .iter()
            .position(|e| e.tag == DynamicTag32::NULL)
            .unwrap();
        assert_eq!(terminator, 3);
        // The record after the terminator is still decoded; stopping at
        // the terminator is the caller's job.
        assert_eq!(entries[4].tag, DynamicTag32(0x6fff_fef5));
    }

    #[test]
    fn non_dynamic_section_is_rejected() {
        let buf = image_with_dynamic(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert!(!elf.is_dynamic_section(0));
        assert_eq!(
            elf.dynamic_table(0),
            Err(ParseError::NotDynamicSection(0))
        );
    }

    #[test]
    fn big_endian_dynamic_decodes_identically() {
        let le_buf = image_with_dynamic(Encoding::Little);
        let be_buf = image_with_dynamic(Encoding::Big);
        let le = Elf32File::parse(&le_buf).unwrap().dynamic_table(1).unwrap();
        let be = Elf32File::parse(&be_buf).unwrap().dynamic_table(1).unwrap();
        assert_eq!(le, be);
    }

    #[test]
    fn tag_labels() {
        assert_eq!(DynamicTag32(0).to_string(), "end of dynamic array");
        assert_eq!(DynamicTag32(1).to_string(), "needed library name");
        assert_eq!(
            DynamicTag64(0x6fff_ffff).to_string(),
            "number of version dependency table entries"
        );
        assert_eq!(
            DynamicTag32(0x6000_0001).to_string(),
            "OS-specific dynamic entry 0x60000001"
        );
        assert_eq!(
            DynamicTag32(0x7000_0001).to_string(),
            "processor-specific dynamic entry 0x70000001"
        );
        assert_eq!(
            DynamicTag32(0x8123_4567).to_string(),
            "unknown dynamic entry 0x81234567"
        );
    }
}
