//! Image finalization and serialization.
//!
//! Seals a [`BinaryImage`] into bytes and commits them to disk. The
//! section-header table is placed immediately after the highest section
//! extent (`max(offset + size)` over all laid-out sections), the file header
//! is rewritten with that offset, and the header, program headers, section
//! data and section headers all go out in one synchronous write pass.

use anyhow::{Context, Result};
use object::Endianness;
use object::elf;
use object::endian::{U16, U32, U64};
use object::pod::bytes_of;
use std::mem;
use std::path::Path;

use crate::image::{BinaryImage, Class, Section};
use crate::strtab::StringTable;

fn u16(endian: Endianness, v: u16) -> U16<Endianness> {
    U16::new(endian, v)
}
fn u32(endian: Endianness, v: u32) -> U32<Endianness> {
    U32::new(endian, v)
}
fn u64(endian: Endianness, v: u64) -> U64<Endianness> {
    U64::new(endian, v)
}

/// Write bytes at an absolute file offset, zero-filling any gap.
fn write_at(buffer: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    if buffer.len() < offset + bytes.len() {
        buffer.resize(offset + bytes.len(), 0);
    }
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Serialize a finalized image to its on-disk byte representation.
///
/// The string table backs the section-name section's contents, so its bytes
/// are written in place of that section's cloned data (the registrar keeps
/// the declared size in sync as names are added).
pub fn image_bytes(image: &BinaryImage, strtab: &StringTable) -> Result<Vec<u8>> {
    let endian = image.endian;
    let (ehsize, phentsize, shentsize) = match image.class {
        Class::Elf32 => (
            mem::size_of::<elf::FileHeader32<Endianness>>(),
            mem::size_of::<elf::ProgramHeader32<Endianness>>(),
            mem::size_of::<elf::SectionHeader32<Endianness>>(),
        ),
        Class::Elf64 => (
            mem::size_of::<elf::FileHeader64<Endianness>>(),
            mem::size_of::<elf::ProgramHeader64<Endianness>>(),
            mem::size_of::<elf::SectionHeader64<Endianness>>(),
        ),
    };

    // The true physical end of file, not the last section created. Floored
    // at the header size with the same rule the appender uses.
    let shoff = image.end_of_extent().max(image.class.file_header_size());
    tracing::debug!(shoff, "placing section-header table");

    let mut buffer = vec![0u8; shoff as usize];

    let ident = elf::Ident {
        magic: elf::ELFMAG,
        class: match image.class {
            Class::Elf32 => elf::ELFCLASS32,
            Class::Elf64 => elf::ELFCLASS64,
        },
        data: match endian {
            Endianness::Little => elf::ELFDATA2LSB,
            Endianness::Big => elf::ELFDATA2MSB,
        },
        version: elf::EV_CURRENT,
        os_abi: image.os_abi,
        abi_version: image.abi_version,
        padding: [0; 7],
    };

    match image.class {
        Class::Elf32 => {
            let header = elf::FileHeader32::<Endianness> {
                e_ident: ident,
                e_type: u16(endian, image.e_type),
                e_machine: u16(endian, image.machine),
                e_version: u32(endian, elf::EV_CURRENT as u32),
                e_entry: u32(endian, image.entry as u32),
                e_phoff: u32(endian, image.phoff as u32),
                e_shoff: u32(endian, shoff as u32),
                e_flags: u32(endian, image.flags),
                e_ehsize: u16(endian, ehsize as u16),
                e_phentsize: u16(endian, phentsize as u16),
                e_phnum: u16(endian, image.program_headers.len() as u16),
                e_shentsize: u16(endian, shentsize as u16),
                e_shnum: u16(endian, image.sections.len() as u16),
                e_shstrndx: u16(endian, image.shstrndx),
            };
            write_at(&mut buffer, 0, bytes_of(&header));
        }
        Class::Elf64 => {
            let header = elf::FileHeader64::<Endianness> {
                e_ident: ident,
                e_type: u16(endian, image.e_type),
                e_machine: u16(endian, image.machine),
                e_version: u32(endian, elf::EV_CURRENT as u32),
                e_entry: u64(endian, image.entry),
                e_phoff: u64(endian, image.phoff),
                e_shoff: u64(endian, shoff),
                e_flags: u32(endian, image.flags),
                e_ehsize: u16(endian, ehsize as u16),
                e_phentsize: u16(endian, phentsize as u16),
                e_phnum: u16(endian, image.program_headers.len() as u16),
                e_shentsize: u16(endian, shentsize as u16),
                e_shnum: u16(endian, image.sections.len() as u16),
                e_shstrndx: u16(endian, image.shstrndx),
            };
            write_at(&mut buffer, 0, bytes_of(&header));
        }
    }

    // Program headers stay at the offset preserved from the source.
    for (i, phdr) in image.program_headers.iter().enumerate() {
        let offset = image.phoff as usize + i * phentsize;
        match image.class {
            Class::Elf32 => {
                let out = elf::ProgramHeader32::<Endianness> {
                    p_type: u32(endian, phdr.p_type),
                    p_offset: u32(endian, phdr.p_offset as u32),
                    p_vaddr: u32(endian, phdr.p_vaddr as u32),
                    p_paddr: u32(endian, phdr.p_paddr as u32),
                    p_filesz: u32(endian, phdr.p_filesz as u32),
                    p_memsz: u32(endian, phdr.p_memsz as u32),
                    p_flags: u32(endian, phdr.p_flags),
                    p_align: u32(endian, phdr.p_align as u32),
                };
                write_at(&mut buffer, offset, bytes_of(&out));
            }
            Class::Elf64 => {
                let out = elf::ProgramHeader64::<Endianness> {
                    p_type: u32(endian, phdr.p_type),
                    p_flags: u32(endian, phdr.p_flags),
                    p_offset: u64(endian, phdr.p_offset),
                    p_vaddr: u64(endian, phdr.p_vaddr),
                    p_paddr: u64(endian, phdr.p_paddr),
                    p_filesz: u64(endian, phdr.p_filesz),
                    p_memsz: u64(endian, phdr.p_memsz),
                    p_align: u64(endian, phdr.p_align),
                };
                write_at(&mut buffer, offset, bytes_of(&out));
            }
        }
    }

    // Section data, each block at its exact file position. The name table's
    // backing buffer may have grown past its cloned block, so it is written
    // from the string table instead.
    for (index, section) in image.sections.iter().enumerate().skip(1) {
        if image.shstrndx != 0 && index == image.shstrndx as usize {
            write_at(&mut buffer, section.offset as usize, strtab.as_bytes());
            continue;
        }
        if section.sh_type == elf::SHT_NOBITS {
            continue;
        }
        for block in &section.blocks {
            write_at(
                &mut buffer,
                (section.offset + block.offset) as usize,
                &block.bytes,
            );
        }
    }

    // Section-header table.
    for (i, section) in image.sections.iter().enumerate() {
        let offset = shoff as usize + i * shentsize;
        write_section_header(&mut buffer, offset, image.class, endian, section);
    }

    Ok(buffer)
}

fn write_section_header(
    buffer: &mut Vec<u8>,
    offset: usize,
    class: Class,
    endian: Endianness,
    section: &Section,
) {
    match class {
        Class::Elf32 => {
            let out = elf::SectionHeader32::<Endianness> {
                sh_name: u32(endian, section.name),
                sh_type: u32(endian, section.sh_type),
                sh_flags: u32(endian, section.flags as u32),
                sh_addr: u32(endian, section.addr as u32),
                sh_offset: u32(endian, section.offset as u32),
                sh_size: u32(endian, section.size as u32),
                sh_link: u32(endian, section.link),
                sh_info: u32(endian, section.info),
                sh_addralign: u32(endian, section.addralign as u32),
                sh_entsize: u32(endian, section.entsize as u32),
            };
            write_at(buffer, offset, bytes_of(&out));
        }
        Class::Elf64 => {
            let out = elf::SectionHeader64::<Endianness> {
                sh_name: u32(endian, section.name),
                sh_type: u32(endian, section.sh_type),
                sh_flags: u64(endian, section.flags),
                sh_addr: u64(endian, section.addr),
                sh_offset: u64(endian, section.offset),
                sh_size: u64(endian, section.size),
                sh_link: u32(endian, section.link),
                sh_info: u32(endian, section.info),
                sh_addralign: u64(endian, section.addralign),
                sh_entsize: u64(endian, section.entsize),
            };
            write_at(buffer, offset, bytes_of(&out));
        }
    }
}

/// Finalize the image and commit it to `path` in one write.
///
/// A failed commit leaves whatever was written on disk; callers must treat
/// the destination as invalid and discard it.
pub fn write_image(path: &Path, image: &BinaryImage, strtab: &StringTable) -> Result<()> {
    let buffer = image_bytes(image, strtab)?;
    std::fs::write(path, &buffer).with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), bytes = buffer.len(), "committed image");
    Ok(())
}
