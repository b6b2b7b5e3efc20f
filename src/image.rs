//! Output image model.
//!
//! This module defines the structures describing the ELF image under
//! construction: the file header record, program headers copied verbatim from
//! the source, and sections with their data blocks. It also implements the
//! two mutation paths used while augmenting the image: registering new
//! sections on behalf of the debug-info encoder and appending data blocks to
//! the logical end of a section.
//!
//! Layout invariants maintained here:
//! - a section's file offset is fixed exactly once, when its first data block
//!   is written, to the current end of extent of the whole image;
//! - once assigned, offsets never change and sizes only grow;
//! - sections are laid out in the order their first byte is written, not in
//!   creation order.

use anyhow::{Result, anyhow};
use object::Endianness;
use object::elf;
use object::read::SectionIndex;
use std::mem;

use crate::strtab::StringTable;

/// ELF file class (bitness) of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Elf32,
    Elf64,
}

impl Class {
    /// On-disk size of the ELF file header for this class.
    pub fn file_header_size(self) -> u64 {
        match self {
            Class::Elf32 => mem::size_of::<elf::FileHeader32<Endianness>>() as u64,
            Class::Elf64 => mem::size_of::<elf::FileHeader64<Endianness>>() as u64,
        }
    }
}

/// A program header copied verbatim from the source image. Never regenerated.
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeaderEntry {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

/// A contiguous run of bytes within a section.
///
/// `offset` is relative to the start of the section. Cloned sections carry a
/// single block at offset 0; appended debug data adds blocks at the running
/// write cursor.
#[derive(Debug)]
pub struct DataBlock {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// A section of the output image.
///
/// Header fields are verbatim copies for cloned sections. Freshly registered
/// sections start with `offset = 0` and `size = 0`; both are populated by
/// [`BinaryImage::append`].
#[derive(Debug)]
pub struct Section {
    /// Name as an offset into the section-header string table.
    pub name: u32,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    /// File offset. Zero means "not laid out yet" for sections created during
    /// augmentation; the null section keeps zero forever.
    pub offset: u64,
    /// Declared size. For `SHT_NOBITS` this counts no file bytes.
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addralign: u64,
    pub entsize: u64,
    pub blocks: Vec<DataBlock>,
}

/// A request from the debug-info encoder to create a section.
#[derive(Debug)]
pub struct SectionRequest<'a> {
    pub name: &'a str,
    pub sh_type: u32,
    pub flags: u64,
    pub link: u32,
    pub info: u32,
    /// Advisory only; real sizes are set as data is appended.
    pub size_hint: u64,
}

/// The ELF image being built: a cloned source plus appended debug sections.
///
/// Built in three strict phases: populated by the cloner, extended through
/// [`register_section`]/[`append`] during augmentation, then sealed by the
/// writer. Section indices handed out here are stable for the whole run and
/// equal the final ELF section indices.
///
/// [`register_section`]: BinaryImage::register_section
/// [`append`]: BinaryImage::append
#[derive(Debug)]
pub struct BinaryImage {
    pub class: Class,
    pub endian: Endianness,
    pub os_abi: u8,
    pub abi_version: u8,
    pub e_type: u16,
    pub machine: u16,
    pub entry: u64,
    pub flags: u32,
    /// Program-header table offset, preserved from the source.
    pub phoff: u64,
    /// Index of the section-header string-table section, 0 if none.
    pub shstrndx: u16,
    pub program_headers: Vec<ProgramHeaderEntry>,
    /// Index 0 is always the reserved null section.
    pub sections: Vec<Section>,
}

impl BinaryImage {
    /// End of the image's file extent: `max(offset + size)` over all sections
    /// that have been laid out.
    ///
    /// `SHT_NOBITS` sections are skipped since their size occupies no file
    /// bytes, as are sections with no offset assigned yet. The scan is in
    /// insertion order with a strictly-greater comparison, so the first
    /// section reaching the maximum wins ties.
    pub fn end_of_extent(&self) -> u64 {
        let mut end = 0;
        for section in &self.sections {
            if section.offset == 0 || section.sh_type == elf::SHT_NOBITS {
                continue;
            }
            if section.offset + section.size > end {
                end = section.offset + section.size;
            }
        }
        end
    }

    /// Service a section-creation request from the debug-info encoder.
    ///
    /// Relocation sections (names starting with `.rel`) are never emitted;
    /// for those the request is skipped before any state is touched and
    /// `None` is returned. Otherwise the name is interned, a section with
    /// deferred layout is allocated, and its stable index returned.
    ///
    /// Interning the name grows the section-header string table, so the
    /// declared size of the string-table section is re-synced here on every
    /// successful registration.
    pub fn register_section(
        &mut self,
        strtab: &mut StringTable,
        request: &SectionRequest,
    ) -> Option<SectionIndex> {
        if request.name.starts_with(".rel") {
            tracing::debug!(name = request.name, "skipping relocation section");
            return None;
        }

        let name = strtab.add(request.name);
        if self.shstrndx != 0 {
            self.sections[self.shstrndx as usize].size = strtab.len();
        } else {
            tracing::warn!(
                name = request.name,
                "image has no section name table; the name offset will not resolve"
            );
        }

        self.sections.push(Section {
            name,
            sh_type: request.sh_type,
            flags: request.flags,
            addr: 0,
            offset: 0,
            size: 0,
            link: request.link,
            info: request.info,
            addralign: 1,
            entsize: 0,
            blocks: Vec::new(),
        });
        let index = SectionIndex(self.sections.len() - 1);
        tracing::debug!(
            name = request.name,
            index = index.0,
            sh_type = request.sh_type,
            size_hint = request.size_hint,
            "registered section"
        );
        Some(index)
    }

    /// Append a block of bytes to the logical end of a section.
    ///
    /// The write cursor is the end of the section's last data block (0 if it
    /// has none). The very first write also pins the section's file offset to
    /// the image's current end of extent; later writes only grow the size.
    /// When no section has been laid out yet the extent is floored at the
    /// file-header size, so an assigned offset is always nonzero and never
    /// collides with the "not laid out" sentinel.
    pub fn append(&mut self, index: SectionIndex, bytes: Vec<u8>) -> Result<()> {
        let end = self.end_of_extent().max(self.class.file_header_size());
        let section = self
            .sections
            .get_mut(index.0)
            .ok_or_else(|| anyhow!("no section with index {}", index.0))?;

        let cursor = section
            .blocks
            .last()
            .map(|block| block.offset + block.bytes.len() as u64)
            .unwrap_or(0);

        if section.offset == 0 {
            section.offset = end;
            tracing::debug!(index = index.0, offset = end, "assigned section offset");
        }

        let length = bytes.len() as u64;
        section.blocks.push(DataBlock {
            offset: cursor,
            bytes,
        });
        section.size += length;
        tracing::debug!(
            index = index.0,
            cursor,
            length,
            size = section.size,
            "appended section data"
        );
        Ok(())
    }
}
