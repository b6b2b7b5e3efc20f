//! Source image cloning.
//!
//! Copies an entire source ELF image into a fresh [`BinaryImage`]: header
//! markers, the full program-header table, and every section with its data,
//! all verbatim. Nothing is re-laid-out: the output reproduces the exact
//! input file layout, including any gaps between non-adjacent sections that
//! some producers emit. Debug sections are appended after this copy by the
//! encoder boundary in `encoder.rs`.

use anyhow::{Context, Result, bail};
use object::elf;
use object::read::elf::{FileHeader, ProgramHeader, SectionHeader};
use object::{Endianness, FileKind};

use crate::image::{BinaryImage, Class, DataBlock, ProgramHeaderEntry, Section};
use crate::strtab::StringTable;

/// Clone a source ELF image from its raw bytes.
///
/// Fails if the bytes are not a recognized ELF file. The section-header
/// string table of the source, if present, seeds `strtab` so that names added
/// later dedup against the existing entries.
pub fn clone_image(data: &[u8], strtab: &mut StringTable) -> Result<BinaryImage> {
    let kind = FileKind::parse(data).context("failed to parse source file")?;
    match kind {
        FileKind::Elf32 => clone_file::<elf::FileHeader32<Endianness>>(data, Class::Elf32, strtab),
        FileKind::Elf64 => clone_file::<elf::FileHeader64<Endianness>>(data, Class::Elf64, strtab),
        _ => bail!("source must be an ELF file, found {:?}", kind),
    }
}

fn clone_file<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
    class: Class,
    strtab: &mut StringTable,
) -> Result<BinaryImage> {
    let header = Elf::parse(data).context("failed to read ELF header")?;
    let endian = header.endian().context("failed to read ELF endianness")?;
    let ident = header.e_ident();

    let mut program_headers = Vec::new();
    for phdr in header
        .program_headers(endian, data)
        .context("failed to read program headers")?
    {
        program_headers.push(ProgramHeaderEntry {
            p_type: phdr.p_type(endian),
            p_flags: phdr.p_flags(endian),
            p_offset: phdr.p_offset(endian).into(),
            p_vaddr: phdr.p_vaddr(endian).into(),
            p_paddr: phdr.p_paddr(endian).into(),
            p_filesz: phdr.p_filesz(endian).into(),
            p_memsz: phdr.p_memsz(endian).into(),
            p_align: phdr.p_align(endian).into(),
        });
    }

    let source_sections = header
        .sections(endian, data)
        .context("failed to read section headers")?;
    let shstrndx = header
        .shstrndx(endian, data)
        .context("failed to read section name table index")? as u16;

    // Index 0 stays the reserved null section so image indices equal ELF
    // section indices.
    let mut sections = vec![Section {
        name: 0,
        sh_type: elf::SHT_NULL,
        flags: 0,
        addr: 0,
        offset: 0,
        size: 0,
        link: 0,
        info: 0,
        addralign: 0,
        entsize: 0,
        blocks: Vec::new(),
    }];

    for (index, shdr) in source_sections.iter().enumerate().skip(1) {
        let sh_type = shdr.sh_type(endian);
        let size: u64 = shdr.sh_size(endian).into();

        let mut blocks = Vec::new();
        if sh_type != elf::SHT_NOBITS && size > 0 {
            let bytes = shdr
                .data(endian, data)
                .with_context(|| format!("failed to read data of section {index}"))?;
            blocks.push(DataBlock {
                offset: 0,
                bytes: bytes.to_vec(),
            });
        }

        sections.push(Section {
            name: shdr.sh_name(endian),
            sh_type,
            flags: shdr.sh_flags(endian).into(),
            addr: shdr.sh_addr(endian).into(),
            offset: shdr.sh_offset(endian).into(),
            size,
            link: shdr.sh_link(endian),
            info: shdr.sh_info(endian),
            addralign: shdr.sh_addralign(endian).into(),
            entsize: shdr.sh_entsize(endian).into(),
            blocks,
        });
        tracing::debug!(index, sh_type, size, "cloned section");
    }

    if shstrndx != 0 {
        let table = sections
            .get(shstrndx as usize)
            .ok_or_else(|| anyhow::anyhow!("section name table index {shstrndx} out of range"))?;
        if let Some(block) = table.blocks.first() {
            strtab.load_existing(&block.bytes);
        }
    }

    tracing::info!(
        sections = sections.len(),
        program_headers = program_headers.len(),
        "cloned source image"
    );

    Ok(BinaryImage {
        class,
        endian,
        os_abi: ident.os_abi,
        abi_version: ident.abi_version,
        e_type: header.e_type(endian),
        machine: header.e_machine(endian),
        entry: header.e_entry(endian).into(),
        flags: header.e_flags(endian),
        phoff: header.e_phoff(endian).into(),
        shstrndx,
        program_headers,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_elf_input() {
        let mut strtab = StringTable::new();
        let err = clone_image(b"\x7fELFnope", &mut strtab).unwrap_err();
        assert!(err.to_string().contains("failed to parse source file"));
    }
}
