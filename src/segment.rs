//! Program (segment) headers and segment content access.
//!
//! The 32- and 64-bit program header records carry the same fields but
//! lay them out differently: the flags word sits seventh in the 32-bit
//! record and second in the 64-bit one.

use core::fmt;

use bitflags::bitflags;

use crate::file::{Elf32File, Elf64File};
use crate::reader::{subslice, Encoding};
use crate::ParseError;

/// The type of a segment, from its program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentType(pub u32);

impl SegmentType {
    /// Unused entry.
    pub const NULL: Self = Self(0);
    /// Loadable segment.
    pub const LOADABLE: Self = Self(1);
    /// Dynamic linking tables.
    pub const DYNAMIC_LINKING: Self = Self(2);
    /// Interpreter path name.
    pub const INTERPRETER: Self = Self(3);
    /// Note segment.
    pub const NOTE: Self = Self(4);
    /// Reserved.
    pub const RESERVED: Self = Self(5);
    /// The program header table itself.
    pub const PROGRAM_HEADER_TABLE: Self = Self(6);
    /// GNU stack executability marker.
    pub const GNU_STACK: Self = Self(0x6474_e551);
    /// GNU read-only-after-relocation marker.
    pub const GNU_RELRO: Self = Self(0x6474_e552);
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NULL => write!(f, "unused segment"),
            Self::LOADABLE => write!(f, "loadable segment"),
            Self::DYNAMIC_LINKING => write!(f, "dynamic linking tables"),
            Self::INTERPRETER => write!(f, "interpreter path name segment"),
            Self::NOTE => write!(f, "note segment"),
            Self::RESERVED => write!(f, "reserved segment type"),
            Self::PROGRAM_HEADER_TABLE => write!(f, "program header table"),
            Self::GNU_STACK => write!(f, "stack executability (GNU)"),
            Self::GNU_RELRO => write!(f, "read-only after relocation (GNU)"),
            Self(t) if (0x7000_0000..0x8000_0000).contains(&t) => {
                write!(f, "processor-specific segment: 0x{t:x}")
            }
            Self(t) if (0x6000_0000..0x7000_0000).contains(&t) => {
                write!(f, "OS-specific segment: 0x{t:x}")
            }
            Self(t) => write!(f, "invalid segment type 0x{t:x}"),
        }
    }
}

bitflags! {
    /// Segment permission flags.
    ///
    /// The bit order is inverted relative to section flags: execute is
    /// bit 0 here, and the read bit exists only for segments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// The segment is executable.
        const EXECUTE = 1;
        /// The segment is writable.
        const WRITE = 2;
        /// The segment is readable.
        const READ = 4;
    }
}

impl SegmentFlags {
    /// Returns true if the readable flag is set.
    #[must_use]
    pub fn readable(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns true if the writable flag is set.
    #[must_use]
    pub fn writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns true if the executable flag is set.
    #[must_use]
    pub fn executable(self) -> bool {
        self.contains(Self::EXECUTE)
    }
}

impl fmt::Display for SegmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = |set: bool| if set { "" } else { "not " };
        write!(
            f,
            "{}readable, {}writable, {}executable",
            not(self.readable()),
            not(self.writable()),
            not(self.executable())
        )
    }
}

/// One entry of a 32-bit class program header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader32 {
    /// Segment type.
    pub segment_type: SegmentType,
    /// File offset of the segment data.
    pub file_offset: u32,
    /// Virtual address of the segment.
    pub virtual_address: u32,
    /// Physical address of the segment.
    pub physical_address: u32,
    /// Size of the segment data in the file.
    pub file_size: u32,
    /// Size of the segment in memory.
    pub memory_size: u32,
    /// Segment permission flags.
    pub flags: SegmentFlags,
    /// Required alignment.
    pub align: u32,
}

impl ProgramHeader32 {
    pub(crate) const SIZE: usize = 32;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            segment_type: SegmentType(en.read_u32(data, 0)),
            file_offset: en.read_u32(data, 4),
            virtual_address: en.read_u32(data, 8),
            physical_address: en.read_u32(data, 12),
            file_size: en.read_u32(data, 16),
            memory_size: en.read_u32(data, 20),
            flags: SegmentFlags::from_bits_retain(en.read_u32(data, 24)),
            align: en.read_u32(data, 28),
        }
    }
}

impl fmt::Display for ProgramHeader32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segment at address 0x{:x} (offset 0x{:x} in file). {} bytes in memory, {} in the file, alignment 0x{:x}. {}",
            self.segment_type, self.virtual_address, self.file_offset, self.memory_size,
            self.file_size, self.align, self.flags
        )
    }
}

/// One entry of a 64-bit class program header table.
///
/// Note the flags word moves up to the second position; everything but
/// the type and flags widens to 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader64 {
    /// Segment type.
    pub segment_type: SegmentType,
    /// Segment permission flags.
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

impl ProgramHeader64 {
    pub(crate) const SIZE: usize = 56;

    /// Decode one entry from the start of `data`.
    ///
    /// The caller must ensure `data.len() >= Self::SIZE`.
    pub(crate) fn parse(data: &[u8], en: Encoding) -> Self {
        Self {
            segment_type: SegmentType(en.read_u32(data, 0)),
            flags: SegmentFlags::from_bits_retain(en.read_u32(data, 4)),
            file_offset: en.read_u64(data, 8),
            virtual_address: en.read_u64(data, 16),
            physical_address: en.read_u64(data, 24),
            file_size: en.read_u64(data, 32),
            memory_size: en.read_u64(data, 40),
            align: en.read_u64(data, 48),
        }
    }
}

impl fmt::Display for ProgramHeader64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segment at address 0x{:x} (offset 0x{:x} in file). {} bytes in memory, {} in the file, alignment 0x{:x}. {}",
            self.segment_type, self.virtual_address, self.file_offset, self.memory_size,
            self.file_size, self.align, self.flags
        )
    }
}

impl<'a> Elf32File<'a> {
    /// Returns the file-backed content of the segment at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range, and
    /// [`ParseError::BadSegmentBounds`] if the header's offset/size escape
    /// the buffer or their sum overflows.
    pub fn segment_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        let header = self
            .segments
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        subslice(
            self.raw,
            u64::from(header.file_offset),
            u64::from(header.file_size),
        )
        .ok_or(ParseError::BadSegmentBounds(index))
    }
}

impl<'a> Elf64File<'a> {
    /// Returns the file-backed content of the segment at `index`.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidIndex`] if `index` is out of range, and
    /// [`ParseError::BadSegmentBounds`] if the header's offset/size escape
    /// the buffer or their sum overflows.
    pub fn segment_content(&self, index: u16) -> Result<&'a [u8], ParseError> {
        let header = self
            .segments
            .get(usize::from(index))
            .ok_or(ParseError::InvalidIndex(index))?;
        subslice(self.raw, header.file_offset, header.file_size)
            .ok_or(ParseError::BadSegmentBounds(index))
    }
}
