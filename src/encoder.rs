//! Debug-info encoder boundary.
//!
//! The encoder is an external component that turns semantic debugging
//! information into opaque per-section byte buffers. This module defines the
//! trait it implements and the materialization step that drives it: the
//! encoder's finalize call may create sections through a callback (serviced
//! by the image's registrar) and then yields one byte buffer per finalized
//! section, which are appended in yielded order. Append order determines the
//! final file offsets of any section first written here, so it is preserved
//! exactly.

use anyhow::{Context, Result};
use object::Endianness;
use object::read::SectionIndex;

use crate::arch;
use crate::image::{BinaryImage, Class, SectionRequest};
use crate::strtab::StringTable;

/// Target parameters handed to the encoder at session start.
pub struct SessionParams {
    /// Target bitness.
    pub class: Class,
    /// Target byte order.
    pub endian: Endianness,
    /// Processor/ISA identifier, e.g. "x86_64".
    pub isa: &'static str,
}

/// One finalized debug section: where it goes and what it holds.
pub struct SectionPayload {
    pub section: SectionIndex,
    pub bytes: Vec<u8>,
}

/// A staged producer of debug-information sections.
///
/// The core owns only the output routing; the encoder's internal
/// representation is opaque. Both calls are synchronous; the section-creation
/// callback passed to [`finalize`] is invoked zero or more times strictly
/// during that call, never concurrently or later. A `None` from the callback
/// means the requested section is not needed (relocation sections) and is not
/// an error.
///
/// [`finalize`]: DebugEncoder::finalize
pub trait DebugEncoder {
    /// Called once at session start with the target parameters.
    fn begin(&mut self, params: &SessionParams) -> Result<()>;

    /// Finalize the internal representation into per-section byte buffers.
    ///
    /// Returns the payloads in the order they should be appended.
    fn finalize(
        &mut self,
        create_section: &mut dyn FnMut(&SectionRequest) -> Option<SectionIndex>,
    ) -> Result<Vec<SectionPayload>>;
}

/// Drive the encoder and route its output into the image.
pub fn attach_debug_info(
    image: &mut BinaryImage,
    strtab: &mut StringTable,
    encoder: &mut dyn DebugEncoder,
) -> Result<()> {
    let params = SessionParams {
        class: image.class,
        endian: image.endian,
        isa: arch::isa_name(image.machine, image.class),
    };
    encoder
        .begin(&params)
        .context("debug-info session failed to initialize")?;

    let payloads = {
        let mut create_section =
            |request: &SectionRequest| image.register_section(strtab, request);
        encoder
            .finalize(&mut create_section)
            .context("debug-info session failed to finalize")?
    };

    tracing::info!(count = payloads.len(), "attaching debug sections");
    for payload in payloads {
        image
            .append(payload.section, payload.bytes)
            .context("failed to attach debug section data")?;
    }
    Ok(())
}
