//! ELF file identification and the fixed-layout file headers.
//!
//! The first six bytes of the identifier determine everything about how
//! the rest of the file is decoded: the magic signature, the class
//! (32/64-bit) and the data encoding (byte order). The class-specific
//! headers that follow share one shape, with the entry point and table
//! offsets widened to 8 bytes in the 64-bit form.

use core::fmt;

use crate::reader::Encoding;
use crate::ParseError;

/// The ELF magic signature, as a little-endian word: `\x7F 'E' 'L' 'F'`.
///
/// The signature is a fixed byte sequence, so its value is the same no
/// matter which encoding the rest of the header uses.
pub const ELF_SIGNATURE: u32 = 0x464c_457f;

/// Identifier byte marking a 32-bit class file.
pub const CLASS_ELF32: u8 = 1;

/// Identifier byte marking a 64-bit class file.
pub const CLASS_ELF64: u8 = 2;

/// Identifier byte marking little-endian encoding.
pub const ENCODING_LITTLE: u8 = 1;

/// Identifier byte marking big-endian encoding.
pub const ENCODING_BIG: u8 = 2;

/// Bit width of a parsed ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// 32-bit class (identifier class byte 1).
    Elf32,
    /// 64-bit class (identifier class byte 2).
    Elf64,
}

/// The object file type from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileType(pub u16);

impl FileType {
    /// Relocatable object file.
    pub const RELOCATABLE: Self = Self(1);
    /// Executable file.
    pub const EXECUTABLE: Self = Self(2);
    /// Shared object file.
    pub const SHARED: Self = Self(3);
    /// Core dump.
    pub const CORE: Self = Self(4);
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RELOCATABLE => write!(f, "relocatable file"),
            Self::EXECUTABLE => write!(f, "executable file"),
            Self::SHARED => write!(f, "shared file"),
            Self::CORE => write!(f, "core file"),
            Self(other) => write!(f, "unknown ELF type: {other}"),
        }
    }
}

/// The machine (architecture) type from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Machine(pub u16);

impl Machine {
    /// SPARC.
    pub const SPARC: Self = Self(0x02);
    /// 32-bit x86.
    pub const X86: Self = Self(0x03);
    /// MIPS.
    pub const MIPS: Self = Self(0x08);
    /// PowerPC.
    pub const POWERPC: Self = Self(0x14);
    /// 32-bit ARM.
    pub const ARM: Self = Self(0x28);
    /// x86-64.
    pub const AMD64: Self = Self(0x3e);
    /// 64-bit ARM.
    pub const ARM64: Self = Self(0xb7);
    /// AMD GPU.
    pub const AMDGPU: Self = Self(0xe0);
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self(0) => write!(f, "unspecified machine type"),
            Self::SPARC => write!(f, "SPARC"),
            Self::X86 => write!(f, "x86"),
            Self::MIPS => write!(f, "MIPS"),
            Self::POWERPC => write!(f, "PowerPC"),
            Self::ARM => write!(f, "ARM"),
            Self::AMD64 => write!(f, "AMD64"),
            Self::ARM64 => write!(f, "ARM64"),
            Self::AMDGPU => write!(f, "AMD GPU"),
            Self(other) => write!(f, "unknown machine type: 0x{other:02x}"),
        }
    }
}

/// Validates the shared identifier prefix and returns the data encoding.
///
/// Checks, in order: buffer length (at least 6 bytes), the magic
/// signature read as a little-endian word, the class byte, and the
/// encoding byte. The class byte is checked again after the full header
/// decode, against the class the entry point expects.
pub(crate) fn detect_encoding(raw: &[u8]) -> Result<Encoding, ParseError> {
    if raw.len() < 6 {
        return Err(ParseError::ShortBuffer);
    }
    let signature = Encoding::Little.read_u32(raw, 0);
    if signature != ELF_SIGNATURE {
        return Err(ParseError::BadSignature(signature));
    }
    if raw[4] != CLASS_ELF32 && raw[4] != CLASS_ELF64 {
        return Err(ParseError::BadClass(raw[4]));
    }
    match raw[5] {
        ENCODING_LITTLE => Ok(Encoding::Little),
        ENCODING_BIG => Ok(Encoding::Big),
        other => Err(ParseError::BadEncoding(other)),
    }
}

/// The decoded file header of a 32-bit class ELF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader32 {
    /// The magic signature, always [`ELF_SIGNATURE`] after decoding.
    pub signature: u32,
    /// Class byte from the identifier (1 for this header).
    pub class: u8,
    /// Encoding byte from the identifier.
    pub encoding: u8,
    /// Identifier version byte.
    pub ident_version: u8,
    /// OS/ABI identification byte.
    pub os_abi: u8,
    /// ABI version byte.
    pub abi_version: u8,
    /// Object file type.
    pub file_type: FileType,
    /// Machine type.
    pub machine: Machine,
    /// Object file version.
    pub version: u32,
    /// Virtual address of the entry point.
    pub entry_point: u32,
    /// File offset of the program header table.
    pub program_header_offset: u32,
    /// File offset of the section header table.
    pub section_header_offset: u32,
    /// Processor-specific flags.
    pub flags: u32,
    /// Size of this header in bytes.
    pub header_size: u16,
    /// Size of one program header table entry.
    pub program_header_entry_size: u16,
    /// Number of program header table entries.
    pub program_header_entries: u16,
    /// Size of one section header table entry.
    pub section_header_entry_size: u16,
    /// Number of section header table entries.
    pub section_header_entries: u16,
    /// Index of the section holding section names.
    pub section_names_table: u16,
}

impl FileHeader32 {
    pub(crate) const SIZE: usize = 52;

    /// Decode the header from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`. The signature
    /// field is stored as the canonical little-endian value regardless of
    /// `en`; a byte-swapped copy of a fixed byte sequence would be
    /// meaningless.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            signature: ELF_SIGNATURE,
            class: data[4],
            encoding: data[5],
            ident_version: data[6],
            os_abi: data[7],
            abi_version: data[8],
            file_type: FileType(en.read_u16(data, 16)),
            machine: Machine(en.read_u16(data, 18)),
            version: en.read_u32(data, 20),
            entry_point: en.read_u32(data, 24),
            program_header_offset: en.read_u32(data, 28),
            section_header_offset: en.read_u32(data, 32),
            flags: en.read_u32(data, 36),
            header_size: en.read_u16(data, 40),
            program_header_entry_size: en.read_u16(data, 42),
            program_header_entries: en.read_u16(data, 44),
            section_header_entry_size: en.read_u16(data, 46),
            section_header_entries: en.read_u16(data, 48),
            section_names_table: en.read_u16(data, 50),
        }
    }
}

impl fmt::Display for FileHeader32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "32-bit ELF file for {}", self.machine)
    }
}

/// The decoded file header of a 64-bit class ELF.
///
/// Same shape as [`FileHeader32`], with the entry point and the two table
/// offsets widened to 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader64 {
    /// The magic signature, always [`ELF_SIGNATURE`] after decoding.
    pub signature: u32,
    /// Class byte from the identifier (2 for this header).
    pub class: u8,
    /// Encoding byte from the identifier.
    pub encoding: u8,
    /// Identifier version byte.
    pub ident_version: u8,
    /// OS/ABI identification byte.
    pub os_abi: u8,
    /// ABI version byte.
    pub abi_version: u8,
    /// Object file type.
    pub file_type: FileType,
    /// Machine type.
    pub machine: Machine,
    /// Object file version.
    pub version: u32,
    /// Virtual address of the entry point.
    pub entry_point: u64,
    /// File offset of the program header table.
    pub program_header_offset: u64,
    /// File offset of the section header table.
    pub section_header_offset: u64,
    /// Processor-specific flags.
    pub flags: u32,
    /// Size of this header in bytes.
    pub header_size: u16,
    /// Size of one program header table entry.
    pub program_header_entry_size: u16,
    /// Number of program header table entries.
    pub program_header_entries: u16,
    /// Size of one section header table entry.
    pub section_header_entry_size: u16,
    /// Number of section header table entries.
    pub section_header_entries: u16,
    /// Index of the section holding section names.
    pub section_names_table: u16,
}

impl FileHeader64 {
    pub(crate) const SIZE: usize = 64;

    /// Decode the header from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            signature: ELF_SIGNATURE,
            class: data[4],
            encoding: data[5],
            ident_version: data[6],
            os_abi: data[7],
            abi_version: data[8],
            file_type: FileType(en.read_u16(data, 16)),
            machine: Machine(en.read_u16(data, 18)),
            version: en.read_u32(data, 20),
            entry_point: en.read_u64(data, 24),
            program_header_offset: en.read_u64(data, 32),
            section_header_offset: en.read_u64(data, 40),
            flags: en.read_u32(data, 48),
            header_size: en.read_u16(data, 52),
            program_header_entry_size: en.read_u16(data, 54),
            program_header_entries: en.read_u16(data, 56),
            section_header_entry_size: en.read_u16(data, 58),
            section_header_entries: en.read_u16(data, 60),
            section_names_table: en.read_u16(data, 62),
        }
    }
}

impl fmt::Display for FileHeader64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "64-bit ELF file for {}", self.machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::tests::{make_header32, make_header64};

    #[test]
    fn detect_little_endian() {
        let buf = make_header32(Encoding::Little);
        assert_eq!(detect_encoding(&buf), Ok(Encoding::Little));
    }

    #[test]
    fn detect_big_endian() {
        let buf = make_header32(Encoding::Big);
        assert_eq!(detect_encoding(&buf), Ok(Encoding::Big));
    }

    #[test]
    fn reject_short_identifier() {
        assert_eq!(detect_encoding(&[0x7f, b'E']), Err(ParseError::ShortBuffer));
    }

    #[test]
    fn reject_bad_signature() {
        let mut buf = make_header32(Encoding::Little);
        buf[0] = 0x7e;
        assert_eq!(
            detect_encoding(&buf),
            Err(ParseError::BadSignature(0x464c_457e))
        );
    }

    #[test]
    fn reject_bad_encoding_byte() {
        let mut buf = make_header32(Encoding::Little);
        buf[5] = 3;
        assert_eq!(detect_encoding(&buf), Err(ParseError::BadEncoding(3)));
    }

    #[test]
    fn decode_header32_fields() {
        let buf = make_header32(Encoding::Little);
        let hdr = FileHeader32::parse(&buf, Encoding::Little);
        assert_eq!(hdr.signature, ELF_SIGNATURE);
        assert_eq!(hdr.class, CLASS_ELF32);
        assert_eq!(hdr.file_type, FileType::EXECUTABLE);
        assert_eq!(hdr.machine, Machine::ARM);
        assert_eq!(hdr.entry_point, 0x8000);
        assert_eq!(hdr.section_header_entries, 0);
    }

    #[test]
    fn decode_header64_fields() {
        let buf = make_header64(Encoding::Little);
        let hdr = FileHeader64::parse(&buf, Encoding::Little);
        assert_eq!(hdr.signature, ELF_SIGNATURE);
        assert_eq!(hdr.class, CLASS_ELF64);
        assert_eq!(hdr.machine, Machine::AMD64);
        assert_eq!(hdr.entry_point, 0x40_1000);
    }

    #[test]
    fn big_endian_header_preserves_values() {
        let le = FileHeader32::parse(&make_header32(Encoding::Little), Encoding::Little);
        let be = FileHeader32::parse(&make_header32(Encoding::Big), Encoding::Big);
        // The identifier encoding byte differs; every numeric field must not.
        assert_eq!(le.file_type, be.file_type);
        assert_eq!(le.machine, be.machine);
        assert_eq!(le.entry_point, be.entry_point);
        assert_eq!(le.program_header_offset, be.program_header_offset);
        assert_eq!(le.signature, be.signature);
    }

    #[test]
    fn type_and_machine_labels() {
        assert_eq!(FileType::SHARED.to_string(), "shared file");
        assert_eq!(FileType(9).to_string(), "unknown ELF type: 9");
        assert_eq!(Machine::AMD64.to_string(), "AMD64");
        assert_eq!(Machine(0xab).to_string(), "unknown machine type: 0xab");
    }
}
