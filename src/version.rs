//! GNU symbol-versioning records.
//!
//! Version requirement and definition sections are not arrays. Each main
//! record points at its auxiliary chain and at the next main record with
//! offsets relative to its own start, and each auxiliary record's `next`
//! is relative to that auxiliary record. The walk below keeps an explicit
//! record-start cursor instead of assuming adjacency; the chain is the
//! ground truth for where records live.
//!
//! The record layouts are identical in the 32- and 64-bit classes, so a
//! single record family serves both parsed-file types. The number of main
//! records comes from the dynamic table, not from the section itself.

use alloc::vec::Vec;
use core::fmt;

use crate::dynamic::{DynamicTag32, DynamicTag64};
use crate::file::{Elf32File, Elf64File};
use crate::reader::{subslice, Encoding};
use crate::section::SectionType;
use crate::ParseError;

/// One version requirement (`Verneed`) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionNeed {
    /// Structure version of the record itself.
    pub version: u16,
    /// Number of auxiliary records in this requirement's chain.
    pub count: u16,
    /// Offset of the needed file's name in the linked string table.
    pub file: u32,
    /// Offset of the first auxiliary record, relative to this record.
    pub aux_offset: u32,
    /// Offset of the next requirement, relative to this record; 0 ends
    /// the chain.
    pub next: u32,
}

impl VersionNeed {
    pub(crate) const SIZE: usize = 16;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            version: en.read_u16(data, 0),
            count: en.read_u16(data, 2),
            file: en.read_u32(data, 4),
            aux_offset: en.read_u32(data, 8),
            next: en.read_u32(data, 12),
        }
    }
}

impl fmt::Display for VersionNeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Need version {} of file at string table offset {}",
            self.version, self.file
        )
    }
}

/// One auxiliary record (`Vernaux`) of a version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionNeedAux {
    /// Hash of the version token name.
    pub hash: u32,
    /// Flags.
    pub flags: u16,
    /// Version index used by the version symbol table.
    pub other: u16,
    /// Offset of the version token name in the linked string table.
    pub name: u32,
    /// Offset of the next auxiliary record, relative to this record; 0
    /// ends the chain.
    pub next: u32,
}

impl VersionNeedAux {
    pub(crate) const SIZE: usize = 16;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            hash: en.read_u32(data, 0),
            flags: en.read_u16(data, 4),
            other: en.read_u16(data, 6),
            name: en.read_u32(data, 8),
            next: en.read_u32(data, 12),
        }
    }
}

impl fmt::Display for VersionNeedAux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Need definition with hash 0x{:08x} and name at string table offset {}",
            self.hash, self.name
        )
    }
}

/// One version definition (`Verdef`) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDef {
    /// Structure version of the record itself.
    pub version: u16,
    /// Flags.
    pub flags: u16,
    /// Version index used by the version symbol table.
    pub index: u16,
    /// Number of auxiliary records in this definition's chain.
    pub count: u16,
    /// Hash of the version token name.
    pub hash: u32,
    /// Offset of the first auxiliary record, relative to this record.
    pub aux_offset: u32,
    /// Offset of the next definition, relative to this record; 0 ends
    /// the chain.
    pub next: u32,
}

impl VersionDef {
    pub(crate) const SIZE: usize = 20;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            version: en.read_u16(data, 0),
            flags: en.read_u16(data, 2),
            index: en.read_u16(data, 4),
            count: en.read_u16(data, 6),
            hash: en.read_u32(data, 8),
            aux_offset: en.read_u32(data, 12),
            next: en.read_u32(data, 16),
        }
    }
}

impl fmt::Display for VersionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Defines version {} (symbol index {})",
            self.version, self.index
        )
    }
}

/// One auxiliary record (`Verdaux`) of a version definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDefAux {
    /// Offset of the version token name in the linked string table.
    pub name: u32,
    /// Offset of the next auxiliary record, relative to this record; 0
    /// ends the chain.
    pub next: u32,
}

impl VersionDefAux {
    pub(crate) const SIZE: usize = 8;

    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            name: en.read_u32(data, 0),
            next: en.read_u32(data, 4),
        }
    }
}

impl fmt::Display for VersionDefAux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Defines version with name at string table offset {}",
            self.name
        )
    }
}

/// Walks `count` auxiliary requirement records starting at `first`.
///
/// Each record's `next` is relative to that record's own start; the
/// declared count is authoritative, a zero `next` is merely tolerated.
fn walk_need_aux(
    content: &[u8],
    en: Encoding,
    first: u64,
    count: u16,
) -> Result<Vec<VersionNeedAux>, ParseError> {
    let mut out = Vec::new();
    let mut cursor = first;
    for _ in 0..count {
        let bytes = subslice(content, cursor, VersionNeedAux::SIZE as u64)
            .ok_or(ParseError::Truncated)?;
        let record = VersionNeedAux::parse(bytes, en);
        cursor += u64::from(record.next);
        out.push(record);
    }
    Ok(out)
}

/// Walks `count` main requirement records from offset 0 of `content`.
fn walk_needs(
    content: &[u8],
    en: Encoding,
    count: u64,
) -> Result<(Vec<VersionNeed>, Vec<Vec<VersionNeedAux>>), ParseError> {
    let mut needs = Vec::new();
    let mut aux_lists = Vec::new();
    let mut start: u64 = 0;
    let mut read: u64 = 0;
    loop {
        let bytes =
            subslice(content, start, VersionNeed::SIZE as u64).ok_or(ParseError::Truncated)?;
        let record = VersionNeed::parse(bytes, en);
        let aux = walk_need_aux(content, en, start + u64::from(record.aux_offset), record.count)?;
        needs.push(record);
        aux_lists.push(aux);
        read += 1;
        if read >= count {
            break;
        }
        start += u64::from(record.next);
    }
    Ok((needs, aux_lists))
}

/// Walks `count` auxiliary definition records starting at `first`.
fn walk_def_aux(
    content: &[u8],
    en: Encoding,
    first: u64,
    count: u16,
) -> Result<Vec<VersionDefAux>, ParseError> {
    let mut out = Vec::new();
    let mut cursor = first;
    for _ in 0..count {
        let bytes = subslice(content, cursor, VersionDefAux::SIZE as u64)
            .ok_or(ParseError::Truncated)?;
        let record = VersionDefAux::parse(bytes, en);
        cursor += u64::from(record.next);
        out.push(record);
    }
    Ok(out)
}

/// Walks `count` main definition records from offset 0 of `content`.
fn walk_defs(
    content: &[u8],
    en: Encoding,
    count: u64,
) -> Result<(Vec<VersionDef>, Vec<Vec<VersionDefAux>>), ParseError> {
    let mut defs = Vec::new();
    let mut aux_lists = Vec::new();
    let mut start: u64 = 0;
    let mut read: u64 = 0;
    loop {
        let bytes =
            subslice(content, start, VersionDef::SIZE as u64).ok_or(ParseError::Truncated)?;
        let record = VersionDef::parse(bytes, en);
        let aux = walk_def_aux(content, en, start + u64::from(record.aux_offset), record.count)?;
        defs.push(record);
        aux_lists.push(aux);
        read += 1;
        if read >= count {
            break;
        }
        start += u64::from(record.next);
    }
    Ok((defs, aux_lists))
}

impl<'a> Elf32File<'a> {
    /// Returns true if the section at `index` holds GNU version
    /// requirements.
    #[must_use]
    pub fn is_version_requirement_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::GNU_VERSION_REQUIREMENT)
    }

    /// Returns true if the section at `index` holds GNU version
    /// definitions.
    #[must_use]
    pub fn is_version_definition_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::GNU_VERSION_DEFINITION)
    }

    /// Finds the first dynamic section and returns the value of `tag`
    /// from the live part of its table.
    fn dynamic_count(&self, tag: DynamicTag32) -> Result<u64, ParseError> {
        for i in 0..self.section_count() {
            if !self.is_dynamic_section(i) {
                continue;
            }
            let entries = self.dynamic_table(i)?;
            for entry in &entries {
                if entry.tag == DynamicTag32::NULL {
                    break;
                }
                if entry.tag == tag {
                    return Ok(u64::from(entry.value));
                }
            }
            return Err(ParseError::MissingVersionCount);
        }
        Err(ParseError::MissingVersionCount)
    }

    /// Walks the version requirement chains in the section at `index`.
    ///
    /// Returns the main records and, per record, its auxiliary chain. The
    /// record count comes from the dynamic table's requirement-count tag;
    /// a count of 0 yields empty results.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotVersionRequirementSection`] for the wrong section
    /// type, [`ParseError::MissingVersionCount`] if no dynamic table
    /// declares the count, and [`ParseError::Truncated`] if a chain walks
    /// out of the section.
    pub fn version_requirements(
        &self,
        index: u16,
    ) -> Result<(Vec<VersionNeed>, Vec<Vec<VersionNeedAux>>), ParseError> {
        if !self.is_version_requirement_section(index) {
            return Err(ParseError::NotVersionRequirementSection(index));
        }
        let content = self.section_content(index)?;
        let count = self.dynamic_count(DynamicTag32::VERSION_REQUIREMENT_COUNT)?;
        if count == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        walk_needs(content, self.encoding, count)
    }

    /// Walks the version definition chains in the section at `index`.
    ///
    /// Behaves like [`Elf32File::version_requirements`], keyed by the
    /// definition-count tag.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotVersionDefinitionSection`] for the wrong section
    /// type, [`ParseError::MissingVersionCount`] if no dynamic table
    /// declares the count, and [`ParseError::Truncated`] if a chain walks
    /// out of the section.
    pub fn version_definitions(
        &self,
        index: u16,
    ) -> Result<(Vec<VersionDef>, Vec<Vec<VersionDefAux>>), ParseError> {
        if !self.is_version_definition_section(index) {
            return Err(ParseError::NotVersionDefinitionSection(index));
        }
        let content = self.section_content(index)?;
        let count = self.dynamic_count(DynamicTag32::VERSION_DEFINITION_COUNT)?;
        if count == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        walk_defs(content, self.encoding, count)
    }
}

impl<'a> Elf64File<'a> {
    /// Returns true if the section at `index` holds GNU version
    /// requirements.
    #[must_use]
    pub fn is_version_requirement_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::GNU_VERSION_REQUIREMENT)
    }

    /// Returns true if the section at `index` holds GNU version
    /// definitions.
    #[must_use]
    pub fn is_version_definition_section(&self, index: u16) -> bool {
        self.sections
            .get(usize::from(index))
            .is_some_and(|s| s.section_type == SectionType::GNU_VERSION_DEFINITION)
    }

    /// Finds the first dynamic section and returns the value of `tag`
    /// from the live part of its table.
    fn dynamic_count(&self, tag: DynamicTag64) -> Result<u64, ParseError> {
        for i in 0..self.section_count() {
            if !self.is_dynamic_section(i) {
                continue;
            }
            let entries = self.dynamic_table(i)?;
            for entry in &entries {
                if entry.tag == DynamicTag64::NULL {
                    break;
                }
                if entry.tag == tag {
                    return Ok(entry.value);
                }
            }
            return Err(ParseError::MissingVersionCount);
        }
        Err(ParseError::MissingVersionCount)
    }

    /// Walks the version requirement chains in the section at `index`.
    ///
    /// Returns the main records and, per record, its auxiliary chain. The
    /// record count comes from the dynamic table's requirement-count tag;
    /// a count of 0 yields empty results.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotVersionRequirementSection`] for the wrong section
    /// type, [`ParseError::MissingVersionCount`] if no dynamic table
    /// declares the count, and [`ParseError::Truncated`] if a chain walks
    /// out of the section.
    pub fn version_requirements(
        &self,
        index: u16,
    ) -> Result<(Vec<VersionNeed>, Vec<Vec<VersionNeedAux>>), ParseError> {
        if !self.is_version_requirement_section(index) {
            return Err(ParseError::NotVersionRequirementSection(index));
        }
        let content = self.section_content(index)?;
        let count = self.dynamic_count(DynamicTag64::VERSION_REQUIREMENT_COUNT)?;
        if count == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        walk_needs(content, self.encoding, count)
    }

    /// Walks the version definition chains in the section at `index`.
    ///
    /// Behaves like [`Elf64File::version_requirements`], keyed by the
    /// definition-count tag.
    ///
    /// # Errors
    ///
    /// [`ParseError::NotVersionDefinitionSection`] for the wrong section
    /// type, [`ParseError::MissingVersionCount`] if no dynamic table
    /// declares the count, and [`ParseError::Truncated`] if a chain walks
    /// out of the section.
    pub fn version_definitions(
        &self,
        index: u16,
    ) -> Result<(Vec<VersionDef>, Vec<Vec<VersionDefAux>>), ParseError> {
        if !self.is_version_definition_section(index) {
            return Err(ParseError::NotVersionDefinitionSection(index));
        }
        let content = self.section_content(index)?;
        let count = self.dynamic_count(DynamicTag64::VERSION_DEFINITION_COUNT)?;
        if count == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        walk_defs(content, self.encoding, count)
    }
}
