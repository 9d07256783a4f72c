//! # ELF64 Image Format
//!
//! Minimal ELF64 support: enough to validate a 64-bit little-endian x86-64
//! executable, measure the span of its `PT_LOAD` segments, and lay those
//! segments out relative to an allocated base. No relocation, no dynamic
//! linking, no section headers.

use crate::{ImageFormat, ImageFormatError, ImageLayout};
use core::ptr::read_unaligned;

// Minimal ELF64 definitions
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code, clippy::struct_field_names)]
struct Elf64Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code, clippy::struct_field_names)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: PFlags,
    p_offset: u64,
    p_vaddr: u64,
    p_paddr: u64,
    p_filesz: u64,
    p_memsz: u64,
    p_align: u64,
}

const PT_LOAD: u32 = 1;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 62;

const EI_MAGIC_BYTES: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Bitfield wrapper for `Elf64_Phdr.p_flags` (32-bit)
///
/// Layout (LSB→MSB):
/// - bit 0: execute
/// - bit 1: write
/// - bit 2: read
/// - bits 3..31: reserved
#[bitfield_struct::bitfield(u32)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub read: bool,
    #[bits(29)]
    __: u32,
}

/// A loadable segment, as read from a program header.
#[derive(Debug, Clone, Copy)]
struct LoadSegment {
    vaddr: u64,
    offset: u64,
    filesz: u64,
    memsz: u64,
    flags: PFlags,
}

/// 64-bit little-endian x86-64 `ET_EXEC` executables.
///
/// Position-independent (`ET_DYN`) images are rejected; the loader
/// performs no relocation.
pub struct Elf64Format;

impl Elf64Format {
    /// Parse the ELF header and collect `PT_LOAD` program headers, with
    /// overflow-checked bounds on everything the header declares.
    fn parse(bytes: &[u8]) -> Result<(u64, SegmentSpan), ImageFormatError> {
        if bytes.len() < size_of::<Elf64Ehdr>() {
            return Err(ImageFormatError::Truncated);
        }

        // SAFETY: bounds checked above; read_unaligned avoids alignment
        // assumptions about the file buffer.
        let ehdr = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf64Ehdr>()) };

        if ehdr.e_ident[0..4] != EI_MAGIC_BYTES {
            return Err(ImageFormatError::Malformed);
        }
        // Class = 2 (ELF64), Data = 1 (little-endian), Version = 1
        if ehdr.e_ident[4] != 2 || ehdr.e_ident[5] != 1 || ehdr.e_ident[6] != 1 {
            return Err(ImageFormatError::Malformed);
        }
        if ehdr.e_type != ET_EXEC || ehdr.e_machine != EM_X86_64 {
            return Err(ImageFormatError::Malformed);
        }
        if ehdr.e_phentsize as usize != size_of::<Elf64Phdr>() {
            return Err(ImageFormatError::Malformed);
        }

        // Program header table bounds
        let phoff = usize::try_from(ehdr.e_phoff).map_err(|_| ImageFormatError::Arithmetic)?;
        let phentsize = ehdr.e_phentsize as usize;
        let phnum = ehdr.e_phnum as usize;

        let table_size = phentsize
            .checked_mul(phnum)
            .ok_or(ImageFormatError::Arithmetic)?;
        let end = phoff
            .checked_add(table_size)
            .ok_or(ImageFormatError::Arithmetic)?;
        if end > bytes.len() {
            return Err(ImageFormatError::Truncated);
        }

        let mut span = SegmentSpan::default();
        for i in 0..phnum {
            let off = phoff + i * phentsize;
            // SAFETY: off + sizeof(Phdr) is within bytes by the table bound
            // check above.
            let ph = unsafe { read_unaligned(bytes.as_ptr().add(off).cast::<Elf64Phdr>()) };
            if ph.p_type != PT_LOAD {
                continue;
            }
            span.push(
                LoadSegment {
                    vaddr: ph.p_vaddr,
                    offset: ph.p_offset,
                    filesz: ph.p_filesz,
                    memsz: ph.p_memsz,
                    flags: ph.p_flags,
                },
                bytes.len(),
            )?;
        }

        if span.is_empty() {
            return Err(ImageFormatError::Malformed);
        }

        Ok((ehdr.e_entry, span))
    }
}

impl ImageFormat for Elf64Format {
    fn name(&self) -> &'static str {
        "ELF64"
    }

    fn is_valid_header(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 7
            && bytes[0..4] == EI_MAGIC_BYTES
            && bytes[4] == 2
            && bytes[5] == 1
            && bytes[6] == 1
    }

    fn measure(&self, bytes: &[u8]) -> Result<ImageLayout, ImageFormatError> {
        let (entry, span) = Self::parse(bytes)?;

        let entry_offset = entry
            .checked_sub(span.lowest_vaddr)
            .ok_or(ImageFormatError::EntryOutOfBounds)?;
        let load_size = span.load_size()?;
        if entry_offset >= load_size {
            return Err(ImageFormatError::EntryOutOfBounds);
        }
        // The entry must land in a segment that may actually execute.
        if !span
            .segments()
            .any(|s| s.flags.execute() && entry >= s.vaddr && entry < s.vaddr + s.memsz)
        {
            return Err(ImageFormatError::EntryOutOfBounds);
        }

        Ok(ImageLayout {
            entry_offset,
            load_size,
            // ET_EXEC images are linked for a fixed address.
            preferred_base: Some(span.lowest_vaddr),
        })
    }

    fn place(&self, bytes: &[u8], region: &mut [u8]) -> Result<(), ImageFormatError> {
        let (_, span) = Self::parse(bytes)?;
        let load_size =
            usize::try_from(span.load_size()?).map_err(|_| ImageFormatError::Arithmetic)?;
        if region.len() < load_size {
            return Err(ImageFormatError::RegionTooSmall);
        }

        // Zero the whole span first; BSS tails and inter-segment gaps carry
        // no file content.
        region[..load_size].fill(0);

        for seg in span.segments() {
            if seg.filesz == 0 {
                continue;
            }
            // All casts are guarded by SegmentSpan::push at parse time.
            let dst_off = usize::try_from(seg.vaddr - span.lowest_vaddr)
                .map_err(|_| ImageFormatError::Arithmetic)?;
            let src_off = usize::try_from(seg.offset).map_err(|_| ImageFormatError::Arithmetic)?;
            let len = usize::try_from(seg.filesz).map_err(|_| ImageFormatError::Arithmetic)?;
            region[dst_off..dst_off + len].copy_from_slice(&bytes[src_off..src_off + len]);
        }
        Ok(())
    }
}

/// Running span over the `PT_LOAD` segments of one image.
#[derive(Default)]
struct SegmentSpan {
    segments: [Option<LoadSegment>; MAX_LOAD_SEGMENTS],
    count: usize,
    lowest_vaddr: u64,
    highest_end: u64,
}

/// Kernels in this workspace link a handful of `PT_LOAD` segments; a fixed
/// bound keeps the parser allocation-free.
const MAX_LOAD_SEGMENTS: usize = 16;

impl SegmentSpan {
    fn push(&mut self, seg: LoadSegment, file_len: usize) -> Result<(), ImageFormatError> {
        if seg.memsz < seg.filesz {
            return Err(ImageFormatError::Malformed);
        }
        // File-backed content must be inside the buffer.
        let file_end = seg
            .offset
            .checked_add(seg.filesz)
            .ok_or(ImageFormatError::Arithmetic)?;
        if file_end > file_len as u64 {
            return Err(ImageFormatError::Truncated);
        }
        let mem_end = seg
            .vaddr
            .checked_add(seg.memsz)
            .ok_or(ImageFormatError::Arithmetic)?;

        if self.count == MAX_LOAD_SEGMENTS {
            return Err(ImageFormatError::Malformed);
        }
        if self.count == 0 || seg.vaddr < self.lowest_vaddr {
            self.lowest_vaddr = seg.vaddr;
        }
        if mem_end > self.highest_end {
            self.highest_end = mem_end;
        }
        self.segments[self.count] = Some(seg);
        self.count += 1;
        Ok(())
    }

    const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn load_size(&self) -> Result<u64, ImageFormatError> {
        let size = self.highest_end - self.lowest_vaddr;
        if size == 0 {
            return Err(ImageFormatError::Malformed);
        }
        // The span must fit in the address space of the loading machine.
        usize::try_from(size).map_err(|_| ImageFormatError::Arithmetic)?;
        Ok(size)
    }

    fn segments(&self) -> impl Iterator<Item = LoadSegment> + '_ {
        self.segments.iter().take(self.count).filter_map(|s| *s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assemble a minimal ELF64 with one `PT_LOAD` segment.
    fn minimal_elf(entry: u64, vaddr: u64, payload: &[u8], memsz: u64) -> Vec<u8> {
        let ehsize = size_of::<Elf64Ehdr>() as u64; // 64
        let phsize = size_of::<Elf64Phdr>() as u64; // 56
        let payload_off = ehsize + phsize;

        let mut out = Vec::new();
        // e_ident
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&ET_EXEC.to_le_bytes()); // e_type
        out.extend_from_slice(&EM_X86_64.to_le_bytes()); // e_machine
        out.extend_from_slice(&1u32.to_le_bytes()); // e_version
        out.extend_from_slice(&entry.to_le_bytes()); // e_entry
        out.extend_from_slice(&ehsize.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&u16::try_from(ehsize).unwrap().to_le_bytes()); // e_ehsize
        out.extend_from_slice(&u16::try_from(phsize).unwrap().to_le_bytes()); // e_phentsize
        out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(out.len() as u64, ehsize);

        // one PT_LOAD program header
        out.extend_from_slice(&PT_LOAD.to_le_bytes()); // p_type
        out.extend_from_slice(&5u32.to_le_bytes()); // p_flags (R+X)
        out.extend_from_slice(&payload_off.to_le_bytes()); // p_offset
        out.extend_from_slice(&vaddr.to_le_bytes()); // p_vaddr
        out.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes()); // p_filesz
        out.extend_from_slice(&memsz.to_le_bytes()); // p_memsz
        out.extend_from_slice(&0x1000u64.to_le_bytes()); // p_align
        assert_eq!(out.len() as u64, payload_off);

        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn header_sniff_accepts_elf64_le() {
        let elf = minimal_elf(0x1000, 0x1000, b"\x90\x90", 2);
        assert!(Elf64Format.is_valid_header(&elf));
    }

    #[test]
    fn header_sniff_rejects_garbage_and_short_input() {
        assert!(!Elf64Format.is_valid_header(b""));
        assert!(!Elf64Format.is_valid_header(b"\x7FELF"));
        assert!(!Elf64Format.is_valid_header(b"MZ\x90\x00garbage"));
        // 32-bit class
        let mut elf = minimal_elf(0x1000, 0x1000, b"\x90", 1);
        elf[4] = 1;
        assert!(!Elf64Format.is_valid_header(&elf));
    }

    #[test]
    fn measure_derives_entry_offset_and_span() {
        let elf = minimal_elf(0x0010_0040, 0x0010_0000, &[0xCC; 0x80], 0x200);
        let layout = Elf64Format.measure(&elf).unwrap();
        assert_eq!(layout.entry_offset, 0x40);
        assert_eq!(layout.load_size, 0x200);
        assert_eq!(layout.preferred_base, Some(0x0010_0000));
    }

    #[test]
    fn measure_rejects_entry_below_and_beyond_span() {
        let below = minimal_elf(0x0F_0000, 0x0010_0000, &[0xCC; 0x80], 0x200);
        assert_eq!(
            Elf64Format.measure(&below),
            Err(ImageFormatError::EntryOutOfBounds)
        );
        let beyond = minimal_elf(0x0010_0400, 0x0010_0000, &[0xCC; 0x80], 0x200);
        assert_eq!(
            Elf64Format.measure(&beyond),
            Err(ImageFormatError::EntryOutOfBounds)
        );
    }

    #[test]
    fn measure_rejects_entry_in_non_executable_segment() {
        let mut elf = minimal_elf(0x2000, 0x2000, &[0x90; 0x10], 0x10);
        let flags_off = size_of::<Elf64Ehdr>() + 4;
        elf[flags_off..flags_off + 4].copy_from_slice(&6u32.to_le_bytes()); // RW, no X
        assert_eq!(
            Elf64Format.measure(&elf),
            Err(ImageFormatError::EntryOutOfBounds)
        );
    }

    #[test]
    fn measure_rejects_wrong_machine() {
        let mut elf = minimal_elf(0x1000, 0x1000, b"\x90", 1);
        elf[18] = 0x28; // not x86-64 anymore
        assert_eq!(Elf64Format.measure(&elf), Err(ImageFormatError::Malformed));
    }

    #[test]
    fn measure_rejects_truncated_program_headers() {
        let elf = minimal_elf(0x1000, 0x1000, b"\x90", 1);
        let truncated = &elf[..size_of::<Elf64Ehdr>() + 8];
        assert_eq!(
            Elf64Format.measure(truncated),
            Err(ImageFormatError::Truncated)
        );
    }

    #[test]
    fn measure_rejects_segment_payload_past_eof() {
        let mut elf = minimal_elf(0x1000, 0x1000, b"\x90\x90", 2);
        // Inflate p_filesz beyond the buffer.
        let filesz_off = size_of::<Elf64Ehdr>() + 32;
        elf[filesz_off..filesz_off + 8].copy_from_slice(&0x10_0000u64.to_le_bytes());
        // memsz must stay >= filesz
        elf[filesz_off + 8..filesz_off + 16].copy_from_slice(&0x10_0000u64.to_le_bytes());
        assert_eq!(Elf64Format.measure(&elf), Err(ImageFormatError::Truncated));
    }

    #[test]
    fn place_copies_payload_and_zeroes_bss_tail() {
        let payload = [0xABu8; 0x10];
        let elf = minimal_elf(0x2000, 0x2000, &payload, 0x40);
        let layout = Elf64Format.measure(&elf).unwrap();
        let mut region = vec![0xFFu8; usize::try_from(layout.load_size).unwrap()];
        Elf64Format.place(&elf, &mut region).unwrap();
        assert_eq!(&region[..0x10], &payload);
        assert!(region[0x10..0x40].iter().all(|&b| b == 0));
    }

    #[test]
    fn place_refuses_undersized_region() {
        let elf = minimal_elf(0x2000, 0x2000, &[0xAB; 0x10], 0x40);
        let mut region = vec![0u8; 0x20];
        assert_eq!(
            Elf64Format.place(&elf, &mut region),
            Err(ImageFormatError::RegionTooSmall)
        );
    }
}
