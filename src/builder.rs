//! Build orchestration.
//!
//! One build is a strict three-phase pipeline with single-owner mutation:
//! the cloner populates a fresh [`BinaryImage`] from the source, the
//! materializer extends it with encoder-produced debug sections, and the
//! writer seals and commits it. The string table is constructed here and
//! scoped to the one invocation, so independent builds never share state.
//!
//! Any failure is fatal for the build; a partially written destination file
//! is left on disk and must be discarded by the caller.

use anyhow::{Context, Result};
use memmap2::Mmap;
use object::elf;
use std::fs::File;
use std::path::Path;

use crate::arch::{ProcessorFamily, machine_code};
use crate::cloner::clone_image;
use crate::encoder::{DebugEncoder, attach_debug_info};
use crate::image::BinaryImage;
use crate::strtab::StringTable;
use crate::writer::write_image;

/// Fill in the machine-type constant when the source image leaves it unset.
///
/// Some producers emit `EM_NONE`; the host analysis environment's
/// processor-family name then decides the constant, with a generic fallback
/// for unrecognized names. A machine type cloned from the source is never
/// overridden.
pub fn resolve_machine(image: &mut BinaryImage, processor: Option<&str>) {
    if image.machine != elf::EM_NONE {
        return;
    }
    let family = processor.and_then(ProcessorFamily::from_name);
    image.machine = machine_code(family, image.class);
    tracing::debug!(machine = image.machine, "resolved machine type");
}

/// Clone `source` to `dest`, attaching debug sections from `encoder` if one
/// is supplied. `processor` is the host-reported processor family, consulted
/// only when the source does not declare a machine type.
pub fn build(
    source: &Path,
    dest: &Path,
    processor: Option<&str>,
    encoder: Option<&mut dyn DebugEncoder>,
) -> Result<()> {
    let file =
        File::open(source).with_context(|| format!("failed to open {}", source.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map {}", source.display()))?;

    let mut strtab = StringTable::new();

    // Phase 1: copy.
    let mut image: BinaryImage = clone_image(&mmap, &mut strtab)
        .with_context(|| format!("failed to clone {}", source.display()))?;
    resolve_machine(&mut image, processor);

    // Phase 2: augment.
    if let Some(encoder) = encoder {
        attach_debug_info(&mut image, &mut strtab, encoder)?;
    }

    // Phase 3: commit.
    write_image(dest, &image, &strtab)?;

    tracing::info!(
        source = %source.display(),
        dest = %dest.display(),
        "build complete"
    );
    Ok(())
}
