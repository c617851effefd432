//! The two class-specific parsed-file types and their (re-)parse logic.
//!
//! Parsing is deliberately shallow: only the file header and the section
//! and program header tables are decoded eagerly. Symbol, relocation,
//! dynamic, string and version tables decode on demand from the borrowed
//! buffer, so parse time and memory stay bounded by the header tables.

use alloc::vec::Vec;

use crate::header::{detect_encoding, FileHeader32, FileHeader64, CLASS_ELF32, CLASS_ELF64};
use crate::reader::{subslice, Encoding};
use crate::section::{SectionHeader32, SectionHeader64};
use crate::segment::{ProgramHeader32, ProgramHeader64};
use crate::ParseError;

/// A parsed 32-bit class ELF file.
///
/// The header and the two header tables are owned; everything else is
/// read on demand from `raw`. The fields are public so that callers who
/// have opted into a specific width can inspect the records directly;
/// after replacing `raw`, call [`Elf32File::reparse`] before using any
/// derived data again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elf32File<'a> {
    /// The decoded file header.
    pub header: FileHeader32,
    /// The decoded section header table, in file order.
    pub sections: Vec<SectionHeader32>,
    /// The decoded program header table, in file order.
    pub segments: Vec<ProgramHeader32>,
    /// The borrowed raw file image.
    pub raw: &'a [u8],
    pub(crate) encoding: Encoding,
}

/// A parsed 64-bit class ELF file.
///
/// See [`Elf32File`]; the two types differ only in field widths and the
/// on-disk record layouts they decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elf64File<'a> {
    /// The decoded file header.
    pub header: FileHeader64,
    /// The decoded section header table, in file order.
    pub sections: Vec<SectionHeader64>,
    /// The decoded program header table, in file order.
    pub segments: Vec<ProgramHeader64>,
    /// The borrowed raw file image.
    pub raw: &'a [u8],
    pub(crate) encoding: Encoding,
}

impl<'a> Elf32File<'a> {
    /// Parses `raw` as a 32-bit class ELF file.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::BadClass`] if the file identifies as any
    /// other class, or with the underlying error if the identifier,
    /// header or header tables are malformed.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ParseError> {
        let (header, encoding) = parse_header32(raw)?;
        let segments = parse_program_headers32(raw, &header, encoding)?;
        let sections = parse_section_headers32(raw, &header, encoding)?;
        Ok(Self {
            header,
            sections,
            segments,
            raw,
            encoding,
        })
    }

    /// Re-runs header, segment-table and section-table decoding against
    /// the current `raw` buffer.
    ///
    /// Previously returned decoded tables are by-value copies and stay
    /// valid. The operation is idempotent and leaves the parsed state
    /// untouched on error.
    pub fn reparse(&mut self) -> Result<(), ParseError> {
        let (header, encoding) = parse_header32(self.raw)?;
        let segments = parse_program_headers32(self.raw, &header, encoding)?;
        let sections = parse_section_headers32(self.raw, &header, encoding)?;
        self.header = header;
        self.encoding = encoding;
        self.segments = segments;
        self.sections = sections;
        Ok(())
    }

    /// The byte order the file's multi-byte fields are stored in.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Number of entries in the section header table.
    #[must_use]
    pub fn section_count(&self) -> u16 {
        self.sections.len() as u16
    }

    /// Number of entries in the program header table.
    #[must_use]
    pub fn segment_count(&self) -> u16 {
        self.segments.len() as u16
    }
}

impl<'a> Elf64File<'a> {
    /// Parses `raw` as a 64-bit class ELF file.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::BadClass`] if the file identifies as any
    /// other class, or with the underlying error if the identifier,
    /// header or header tables are malformed.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ParseError> {
        let (header, encoding) = parse_header64(raw)?;
        let segments = parse_program_headers64(raw, &header, encoding)?;
        let sections = parse_section_headers64(raw, &header, encoding)?;
        Ok(Self {
            header,
            sections,
            segments,
            raw,
            encoding,
        })
    }

    /// Re-runs header, segment-table and section-table decoding against
    /// the current `raw` buffer.
    ///
    /// Previously returned decoded tables are by-value copies and stay
    /// valid. The operation is idempotent and leaves the parsed state
    /// untouched on error.
    pub fn reparse(&mut self) -> Result<(), ParseError> {
        let (header, encoding) = parse_header64(self.raw)?;
        let segments = parse_program_headers64(self.raw, &header, encoding)?;
        let sections = parse_section_headers64(self.raw, &header, encoding)?;
        self.header = header;
        self.encoding = encoding;
        self.segments = segments;
        self.sections = sections;
        Ok(())
    }

    /// The byte order the file's multi-byte fields are stored in.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Number of entries in the section header table.
    #[must_use]
    pub fn section_count(&self) -> u16 {
        self.sections.len() as u16
    }

    /// Number of entries in the program header table.
    #[must_use]
    pub fn segment_count(&self) -> u16 {
        self.segments.len() as u16
    }
}

fn parse_header32(raw: &[u8]) -> Result<(FileHeader32, Encoding), ParseError> {
    let en = detect_encoding(raw)?;
    if raw.len() < FileHeader32::SIZE {
        return Err(ParseError::ShortBuffer);
    }
    let header = FileHeader32::parse(raw, en);
    if header.class != CLASS_ELF32 {
        return Err(ParseError::BadClass(header.class));
    }
    Ok((header, en))
}

fn parse_header64(raw: &[u8]) -> Result<(FileHeader64, Encoding), ParseError> {
    let en = detect_encoding(raw)?;
    if raw.len() < FileHeader64::SIZE {
        return Err(ParseError::ShortBuffer);
    }
    let header = FileHeader64::parse(raw, en);
    if header.class != CLASS_ELF64 {
        return Err(ParseError::BadClass(header.class));
    }
    Ok((header, en))
}

fn parse_program_headers32(
    raw: &[u8],
    header: &FileHeader32,
    en: Encoding,
) -> Result<Vec<ProgramHeader32>, ParseError> {
    let offset = u64::from(header.program_header_offset);
    if offset >= raw.len() as u64 {
        return Err(ParseError::BadSegmentTableOffset(offset));
    }
    let count = usize::from(header.program_header_entries);
    let table = subslice(raw, offset, (count * ProgramHeader32::SIZE) as u64)
        .ok_or(ParseError::ShortSegmentTable)?;
    Ok((0..count)
        .map(|i| ProgramHeader32::parse(&table[i * ProgramHeader32::SIZE..], en))
        .collect())
}

fn parse_program_headers64(
    raw: &[u8],
    header: &FileHeader64,
    en: Encoding,
) -> Result<Vec<ProgramHeader64>, ParseError> {
    let offset = header.program_header_offset;
    if offset >= raw.len() as u64 {
        return Err(ParseError::BadSegmentTableOffset(offset));
    }
    let count = usize::from(header.program_header_entries);
    let table = subslice(raw, offset, (count * ProgramHeader64::SIZE) as u64)
        .ok_or(ParseError::ShortSegmentTable)?;
    Ok((0..count)
        .map(|i| ProgramHeader64::parse(&table[i * ProgramHeader64::SIZE..], en))
        .collect())
}

fn parse_section_headers32(
    raw: &[u8],
    header: &FileHeader32,
    en: Encoding,
) -> Result<Vec<SectionHeader32>, ParseError> {
    // A file with no sections is legal and needs no valid table offset.
    if header.section_header_entries == 0 {
        return Ok(Vec::new());
    }
    let offset = u64::from(header.section_header_offset);
    if offset >= raw.len() as u64 {
        return Err(ParseError::BadSectionTableOffset(offset));
    }
    let count = usize::from(header.section_header_entries);
    let table = subslice(raw, offset, (count * SectionHeader32::SIZE) as u64)
        .ok_or(ParseError::ShortSectionTable)?;
    Ok((0..count)
        .map(|i| SectionHeader32::parse(&table[i * SectionHeader32::SIZE..], en))
        .collect())
}

fn parse_section_headers64(
    raw: &[u8],
    header: &FileHeader64,
    en: Encoding,
) -> Result<Vec<SectionHeader64>, ParseError> {
    if header.section_header_entries == 0 {
        return Ok(Vec::new());
    }
    let offset = header.section_header_offset;
    if offset >= raw.len() as u64 {
        return Err(ParseError::BadSectionTableOffset(offset));
    }
    let count = usize::from(header.section_header_entries);
    let table = subslice(raw, offset, (count * SectionHeader64::SIZE) as u64)
        .ok_or(ParseError::ShortSectionTable)?;
    Ok((0..count)
        .map(|i| SectionHeader64::parse(&table[i * SectionHeader64::SIZE..], en))
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::{ELF_SIGNATURE, ENCODING_BIG, ENCODING_LITTLE};

    // ---- image builders, shared by the other modules' tests ---------------

    pub(crate) fn put_u16(buf: &mut [u8], off: usize, v: u16, en: Encoding) {
        let bytes = match en {
            Encoding::Little => v.to_le_bytes(),
            Encoding::Big => v.to_be_bytes(),
        };
        buf[off..off + 2].copy_from_slice(&bytes);
    }

    pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32, en: Encoding) {
        let bytes = match en {
            Encoding::Little => v.to_le_bytes(),
            Encoding::Big => v.to_be_bytes(),
        };
        buf[off..off + 4].copy_from_slice(&bytes);
    }

    pub(crate) fn put_u64(buf: &mut [u8], off: usize, v: u64, en: Encoding) {
        let bytes = match en {
            Encoding::Little => v.to_le_bytes(),
            Encoding::Big => v.to_be_bytes(),
        };
        buf[off..off + 8].copy_from_slice(&bytes);
    }

    /// A minimal valid 32-bit header: ARM executable, entry 0x8000, no
    /// tables.
    pub(crate) fn make_header32(en: Encoding) -> Vec<u8> {
        let mut buf = vec![0u8; FileHeader32::SIZE];
        buf[0..4].copy_from_slice(&ELF_SIGNATURE.to_le_bytes());
        buf[4] = CLASS_ELF32;
        buf[5] = match en {
            Encoding::Little => ENCODING_LITTLE,
            Encoding::Big => ENCODING_BIG,
        };
        buf[6] = 1; // identifier version
        put_u16(&mut buf, 16, 2, en); // executable
        put_u16(&mut buf, 18, 0x28, en); // ARM
        put_u32(&mut buf, 20, 1, en);
        put_u32(&mut buf, 24, 0x8000, en); // entry point
        put_u16(&mut buf, 40, FileHeader32::SIZE as u16, en);
        put_u16(&mut buf, 42, ProgramHeader32::SIZE as u16, en);
        put_u16(&mut buf, 46, SectionHeader32::SIZE as u16, en);
        buf
    }

    /// A minimal valid 64-bit header: AMD64 executable, entry 0x401000,
    /// no tables.
    pub(crate) fn make_header64(en: Encoding) -> Vec<u8> {
        let mut buf = vec![0u8; FileHeader64::SIZE];
        buf[0..4].copy_from_slice(&ELF_SIGNATURE.to_le_bytes());
        buf[4] = CLASS_ELF64;
        buf[5] = match en {
            Encoding::Little => ENCODING_LITTLE,
            Encoding::Big => ENCODING_BIG,
        };
        buf[6] = 1;
        put_u16(&mut buf, 16, 2, en); // executable
        put_u16(&mut buf, 18, 0x3e, en); // AMD64
        put_u32(&mut buf, 20, 1, en);
        put_u64(&mut buf, 24, 0x40_1000, en); // entry point
        put_u16(&mut buf, 52, FileHeader64::SIZE as u16, en);
        put_u16(&mut buf, 54, ProgramHeader64::SIZE as u16, en);
        put_u16(&mut buf, 58, SectionHeader64::SIZE as u16, en);
        buf
    }

    /// Declarative section for the image builders. Content is appended
    /// after the header tables; the builder fills in offset and size
    /// unless an override pins them.
    #[derive(Default, Clone)]
    pub(crate) struct SectionSpec {
        pub name_offset: u32,
        pub section_type: u32,
        pub flags: u64,
        pub virtual_address: u64,
        pub linked_index: u32,
        pub info: u32,
        pub align: u64,
        pub entry_size: u64,
        pub content: Vec<u8>,
        pub offset_override: Option<u64>,
        pub size_override: Option<u64>,
    }

    impl SectionSpec {
        /// The all-zero null section that every section table starts with.
        pub(crate) fn null() -> Self {
            Self {
                offset_override: Some(0),
                ..Self::default()
            }
        }
    }

    /// Declarative segment for the image builders.
    #[derive(Default, Clone)]
    pub(crate) struct SegmentSpec {
        pub segment_type: u32,
        pub flags: u32,
        pub virtual_address: u64,
        pub physical_address: u64,
        pub align: u64,
        /// Added to the file size to form the memory size.
        pub memory_size_extra: u64,
        pub content: Vec<u8>,
        pub offset_override: Option<u64>,
        pub file_size_override: Option<u64>,
    }

    /// Assembles a complete 32-bit image: header, section header table,
    /// program header table, then all content blobs in declaration order.
    pub(crate) fn build_image32(
        en: Encoding,
        section_names_table: u16,
        sections: &[SectionSpec],
        segments: &[SegmentSpec],
    ) -> Vec<u8> {
        let mut buf = make_header32(en);
        let shoff = if sections.is_empty() { 0 } else { buf.len() };
        let phoff = if segments.is_empty() {
            0
        } else {
            FileHeader32::SIZE + sections.len() * SectionHeader32::SIZE
        };
        put_u32(&mut buf, 28, phoff as u32, en);
        put_u32(&mut buf, 32, shoff as u32, en);
        put_u16(&mut buf, 44, segments.len() as u16, en);
        put_u16(&mut buf, 48, sections.len() as u16, en);
        put_u16(&mut buf, 50, section_names_table, en);

        let mut cursor = (FileHeader32::SIZE
            + sections.len() * SectionHeader32::SIZE
            + segments.len() * ProgramHeader32::SIZE) as u64;
        let mut contents: Vec<u8> = Vec::new();

        for s in sections {
            let size = s.size_override.unwrap_or(s.content.len() as u64);
            let offset = s.offset_override.unwrap_or(cursor);
            let at = buf.len();
            buf.resize(at + SectionHeader32::SIZE, 0);
            put_u32(&mut buf, at, s.name_offset, en);
            put_u32(&mut buf, at + 4, s.section_type, en);
            put_u32(&mut buf, at + 8, s.flags as u32, en);
            put_u32(&mut buf, at + 12, s.virtual_address as u32, en);
            put_u32(&mut buf, at + 16, offset as u32, en);
            put_u32(&mut buf, at + 20, size as u32, en);
            put_u32(&mut buf, at + 24, s.linked_index, en);
            put_u32(&mut buf, at + 28, s.info, en);
            put_u32(&mut buf, at + 32, s.align as u32, en);
            put_u32(&mut buf, at + 36, s.entry_size as u32, en);
            contents.extend_from_slice(&s.content);
            cursor += s.content.len() as u64;
        }

        for g in segments {
            let file_size = g.file_size_override.unwrap_or(g.content.len() as u64);
            let offset = g.offset_override.unwrap_or(cursor);
            let at = buf.len();
            buf.resize(at + ProgramHeader32::SIZE, 0);
            put_u32(&mut buf, at, g.segment_type, en);
            put_u32(&mut buf, at + 4, offset as u32, en);
            put_u32(&mut buf, at + 8, g.virtual_address as u32, en);
            put_u32(&mut buf, at + 12, g.physical_address as u32, en);
            put_u32(&mut buf, at + 16, file_size as u32, en);
            put_u32(&mut buf, at + 20, (file_size + g.memory_size_extra) as u32, en);
            put_u32(&mut buf, at + 24, g.flags, en);
            put_u32(&mut buf, at + 28, g.align as u32, en);
            contents.extend_from_slice(&g.content);
            cursor += g.content.len() as u64;
        }

        buf.extend_from_slice(&contents);
        buf
    }

    /// Assembles a complete 64-bit image; layout mirrors [`build_image32`].
    pub(crate) fn build_image64(
        en: Encoding,
        section_names_table: u16,
        sections: &[SectionSpec],
        segments: &[SegmentSpec],
    ) -> Vec<u8> {
        let mut buf = make_header64(en);
        let shoff = if sections.is_empty() { 0 } else { buf.len() };
        let phoff = if segments.is_empty() {
            0
        } else {
            FileHeader64::SIZE + sections.len() * SectionHeader64::SIZE
        };
        put_u64(&mut buf, 32, phoff as u64, en);
        put_u64(&mut buf, 40, shoff as u64, en);
        put_u16(&mut buf, 56, segments.len() as u16, en);
        put_u16(&mut buf, 60, sections.len() as u16, en);
        put_u16(&mut buf, 62, section_names_table, en);

        let mut cursor = (FileHeader64::SIZE
            + sections.len() * SectionHeader64::SIZE
            + segments.len() * ProgramHeader64::SIZE) as u64;
        let mut contents: Vec<u8> = Vec::new();

        for s in sections {
            let size = s.size_override.unwrap_or(s.content.len() as u64);
            let offset = s.offset_override.unwrap_or(cursor);
            let at = buf.len();
            buf.resize(at + SectionHeader64::SIZE, 0);
            put_u32(&mut buf, at, s.name_offset, en);
            put_u32(&mut buf, at + 4, s.section_type, en);
            put_u64(&mut buf, at + 8, s.flags, en);
            put_u64(&mut buf, at + 16, s.virtual_address, en);
            put_u64(&mut buf, at + 24, offset, en);
            put_u64(&mut buf, at + 32, size, en);
            put_u32(&mut buf, at + 40, s.linked_index, en);
            put_u32(&mut buf, at + 44, s.info, en);
            put_u64(&mut buf, at + 48, s.align, en);
            put_u64(&mut buf, at + 56, s.entry_size, en);
            contents.extend_from_slice(&s.content);
            cursor += s.content.len() as u64;
        }

        for g in segments {
            let file_size = g.file_size_override.unwrap_or(g.content.len() as u64);
            let offset = g.offset_override.unwrap_or(cursor);
            let at = buf.len();
            buf.resize(at + ProgramHeader64::SIZE, 0);
            put_u32(&mut buf, at, g.segment_type, en);
            put_u32(&mut buf, at + 4, g.flags, en);
            put_u64(&mut buf, at + 8, offset, en);
            put_u64(&mut buf, at + 16, g.virtual_address, en);
            put_u64(&mut buf, at + 24, g.physical_address, en);
            put_u64(&mut buf, at + 32, file_size, en);
            put_u64(&mut buf, at + 40, file_size + g.memory_size_extra, en);
            put_u64(&mut buf, at + 48, g.align, en);
            contents.extend_from_slice(&g.content);
            cursor += g.content.len() as u64;
        }

        buf.extend_from_slice(&contents);
        buf
    }

    // ---- parse / reparse tests --------------------------------------------

    #[test]
    fn parse_minimal_32bit() {
        let buf = make_header32(Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert_eq!(elf.section_count(), 0);
        assert_eq!(elf.segment_count(), 0);
        assert_eq!(elf.encoding(), Encoding::Little);
        assert_eq!(elf.header.entry_point, 0x8000);
    }

    #[test]
    fn parse_minimal_64bit() {
        let buf = make_header64(Encoding::Little);
        let elf = Elf64File::parse(&buf).unwrap();
        assert_eq!(elf.section_count(), 0);
        assert_eq!(elf.header.entry_point, 0x40_1000);
    }

    #[test]
    fn parse_big_endian_64bit() {
        let buf = make_header64(Encoding::Big);
        let elf = Elf64File::parse(&buf).unwrap();
        assert_eq!(elf.encoding(), Encoding::Big);
        assert_eq!(elf.header.entry_point, 0x40_1000);
        // The stored signature stays the canonical little-endian word.
        assert_eq!(elf.header.signature, ELF_SIGNATURE);
    }

    #[test]
    fn class_mismatch_is_rejected() {
        let buf64 = make_header64(Encoding::Little);
        assert_eq!(Elf32File::parse(&buf64), Err(ParseError::BadClass(2)));
        let buf32 = make_header32(Encoding::Little);
        assert_eq!(Elf64File::parse(&buf32), Err(ParseError::BadClass(1)));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let buf = make_header32(Encoding::Little);
        assert_eq!(Elf32File::parse(&buf[..20]), Err(ParseError::ShortBuffer));
        assert_eq!(Elf32File::parse(&[]), Err(ParseError::ShortBuffer));
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut buf = make_header32(Encoding::Little);
        buf[1] = b'X';
        assert!(matches!(
            Elf32File::parse(&buf),
            Err(ParseError::BadSignature(_))
        ));
    }

    #[test]
    fn segment_table_offset_out_of_range() {
        let mut buf = make_header32(Encoding::Little);
        put_u32(&mut buf, 28, 0x1_0000, Encoding::Little); // program header offset
        assert_eq!(
            Elf32File::parse(&buf),
            Err(ParseError::BadSegmentTableOffset(0x1_0000))
        );
    }

    #[test]
    fn segment_table_too_short() {
        let mut buf = make_header32(Encoding::Little);
        put_u32(&mut buf, 28, 4, Encoding::Little);
        put_u16(&mut buf, 44, 3, Encoding::Little); // claims 3 entries
        assert_eq!(
            Elf32File::parse(&buf),
            Err(ParseError::ShortSegmentTable)
        );
    }

    #[test]
    fn section_table_offset_out_of_range() {
        let mut buf = make_header32(Encoding::Little);
        put_u32(&mut buf, 32, 0x9999, Encoding::Little);
        put_u16(&mut buf, 48, 1, Encoding::Little);
        assert_eq!(
            Elf32File::parse(&buf),
            Err(ParseError::BadSectionTableOffset(0x9999))
        );
    }

    #[test]
    fn section_table_too_short() {
        let mut buf = make_header32(Encoding::Little);
        put_u32(&mut buf, 32, 8, Encoding::Little);
        put_u16(&mut buf, 48, 40, Encoding::Little);
        assert_eq!(
            Elf32File::parse(&buf),
            Err(ParseError::ShortSectionTable)
        );
    }

    #[test]
    fn zero_sections_is_legal() {
        // No sections means the table offset is never consulted.
        let mut buf = make_header32(Encoding::Little);
        put_u32(&mut buf, 32, 0xdead_0000, Encoding::Little);
        let elf = Elf32File::parse(&buf).unwrap();
        assert!(elf.sections.is_empty());
    }

    #[test]
    fn reparse_is_idempotent() {
        let buf = build_image32(
            Encoding::Little,
            0,
            &[SectionSpec::null()],
            &[SegmentSpec {
                segment_type: 1,
                content: b"abc".to_vec(),
                ..SegmentSpec::default()
            }],
        );
        let mut elf = Elf32File::parse(&buf).unwrap();
        let before_sections = elf.sections.clone();
        let before_segments = elf.segments.clone();
        elf.reparse().unwrap();
        elf.reparse().unwrap();
        assert_eq!(elf.sections, before_sections);
        assert_eq!(elf.segments, before_segments);
    }

    #[test]
    fn reparse_after_buffer_swap() {
        let one = make_header32(Encoding::Little);
        let mut two = make_header32(Encoding::Little);
        put_u32(&mut two, 24, 0xbeef, Encoding::Little); // entry point

        let mut elf = Elf32File::parse(&one).unwrap();
        assert_eq!(elf.header.entry_point, 0x8000);
        elf.raw = &two;
        elf.reparse().unwrap();
        assert_eq!(elf.header.entry_point, 0xbeef);
    }

    #[test]
    fn reparse_failure_preserves_state() {
        let good = make_header32(Encoding::Little);
        let bad = [0u8; 3];
        let mut elf = Elf32File::parse(&good).unwrap();
        elf.raw = &bad;
        assert_eq!(elf.reparse(), Err(ParseError::ShortBuffer));
        assert_eq!(elf.header.entry_point, 0x8000);
    }
}
