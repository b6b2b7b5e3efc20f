//! ELF copy-and-augment core.
//!
//! This library clones an existing ELF binary into a new image and appends
//! freshly generated debug-information sections supplied by an external
//! encoder, producing a byte-for-byte valid ELF file with the input's exact
//! layout preserved. It is organized into several modules:
//! - `config`: CLI configuration.
//! - `strtab`: section-header string table builder.
//! - `image`: the output image model, section registrar and data appender.
//! - `cloner`: verbatim copy of the source image.
//! - `encoder`: the debug-info encoder boundary and materialization.
//! - `writer`: image finalization and commit.
//! - `arch`: processor-family to machine-code mapping.
//! - `builder`: the three-phase build orchestration.

pub mod arch;
pub mod builder;
pub mod cloner;
pub mod config;
pub mod encoder;
pub mod image;
pub mod strtab;
pub mod writer;
