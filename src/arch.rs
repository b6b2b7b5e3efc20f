//! Processor-family mapping.
//!
//! The host analysis environment identifies the processor family; this core
//! only needs it to pick the ELF machine-type constant and the ISA name
//! handed to the debug-info encoder. Unrecognized families fall back to a
//! generic code with a warning.

use object::elf;

use crate::image::Class;

/// Processor family as reported by the host analysis environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorFamily {
    X86,
    Ppc,
    Arm,
}

impl ProcessorFamily {
    /// Parse a host-supplied processor name. Returns `None` for anything
    /// unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "metapc" | "x86" | "386" => Some(Self::X86),
            "ppc" | "powerpc" => Some(Self::Ppc),
            "arm" => Some(Self::Arm),
            _ => None,
        }
    }
}

/// ELF machine-type constant for a processor family and file class.
///
/// Unknown families default to `EM_386` with a warning.
pub fn machine_code(family: Option<ProcessorFamily>, class: Class) -> u16 {
    let is_64 = class == Class::Elf64;
    match family {
        Some(ProcessorFamily::X86) => {
            if is_64 {
                elf::EM_X86_64
            } else {
                elf::EM_386
            }
        }
        Some(ProcessorFamily::Ppc) => {
            if is_64 {
                elf::EM_PPC64
            } else {
                elf::EM_PPC
            }
        }
        Some(ProcessorFamily::Arm) => {
            if is_64 {
                elf::EM_AARCH64
            } else {
                elf::EM_ARM
            }
        }
        None => {
            tracing::warn!("unknown processor type, using EM_386");
            elf::EM_386
        }
    }
}

/// ISA identifier string for the debug-info encoder session.
pub fn isa_name(machine: u16, class: Class) -> &'static str {
    match machine {
        elf::EM_ARM => "arm",
        elf::EM_AARCH64 => "aarch64",
        elf::EM_PPC => "ppc",
        elf::EM_PPC64 => "ppc64",
        _ => {
            if class == Class::Elf64 {
                "x86_64"
            } else {
                "x86"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_map_to_machine_codes_by_class() {
        let x86 = ProcessorFamily::from_name("metapc");
        assert_eq!(machine_code(x86, Class::Elf32), elf::EM_386);
        assert_eq!(machine_code(x86, Class::Elf64), elf::EM_X86_64);
        let arm = ProcessorFamily::from_name("arm");
        assert_eq!(machine_code(arm, Class::Elf64), elf::EM_AARCH64);
    }

    #[test]
    fn unknown_family_defaults_to_386() {
        assert_eq!(ProcessorFamily::from_name("z80"), None);
        assert_eq!(machine_code(None, Class::Elf64), elf::EM_386);
    }

    #[test]
    fn isa_names_follow_machine_and_class() {
        assert_eq!(isa_name(elf::EM_X86_64, Class::Elf64), "x86_64");
        assert_eq!(isa_name(elf::EM_386, Class::Elf32), "x86");
        assert_eq!(isa_name(elf::EM_PPC64, Class::Elf64), "ppc64");
    }
}
