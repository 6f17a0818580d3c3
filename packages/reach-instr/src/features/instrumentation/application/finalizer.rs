//! Finalization: marker field, version cap, serialization

use std::sync::atomic::Ordering;

use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

use super::type_descriptor::{TypeDescriptor, STATE_INSTRUMENTED};
use crate::errors::{InstrumentError, Result};
use crate::features::classfile::{AttributeInfo, ClassFormatError, ConstantPool};
use crate::features::instrumentation::infrastructure::debug_dump::write_class_artifact;
use crate::shared::constants::access::{ACC_FINAL, ACC_PUBLIC, ACC_STATIC, ACC_TRANSIENT};
use crate::shared::constants::names;

impl TypeDescriptor {
    /// Adds the marker field if missing, caps the major version and
    /// serializes. The parsed representation is dropped afterwards.
    pub fn finalize(&mut self) -> Result<()> {
        let already_instrumented = self.is_instrumented();
        let ceiling = self.config.max_major_version;
        let marker_final = self.config.marker_final;
        let annotations = self.config.field_annotations.clone();
        let qualified_name = self.qualified_name().to_string();

        let class = self
            .class
            .as_mut()
            .ok_or_else(|| InstrumentError::Finalized(qualified_name.clone()))?;

        if !already_instrumented {
            let mut attributes = annotation_attributes(&mut class.constant_pool, &annotations)?;
            let mut access = ACC_PUBLIC | ACC_STATIC | ACC_TRANSIENT;
            if marker_final {
                access |= ACC_FINAL;
                let value = class.constant_pool.add_integer(1)?;
                let name_index = class.constant_pool.add_utf8("ConstantValue")?;
                attributes.push(AttributeInfo {
                    name_index,
                    info: value.to_be_bytes().to_vec(),
                });
            }
            class.add_field(access, names::MARKER_FIELD, "Z", attributes)?;
        }
        let major_version = self.major_version.min(ceiling);
        class.major_version = major_version;
        class.minor_version = self.minor_version;
        let bytes = class.to_bytes()?;

        self.class = None;
        self.instrumented.store(STATE_INSTRUMENTED, Ordering::Release);
        debug!(
            class = %qualified_name,
            major = major_version,
            bytes = bytes.len(),
            "finalized"
        );
        if self.config.write_code {
            write_class_artifact(&self.config.dump_dir, &qualified_name, &bytes);
        }
        self.bytecode = Some(bytes);
        Ok(())
    }

    /// Copy of the finalized class bytes
    pub fn bytecode(&self) -> Result<Vec<u8>> {
        self.bytecode.clone().ok_or(InstrumentError::NotFinalized)
    }
}

/// A `RuntimeVisibleAnnotations` attribute carrying marker annotations
/// without element values; empty when no annotation is configured
pub(crate) fn annotation_attributes(
    pool: &mut ConstantPool,
    annotations: &[String],
) -> std::result::Result<Vec<AttributeInfo>, ClassFormatError> {
    if annotations.is_empty() {
        return Ok(Vec::new());
    }
    let count = u16::try_from(annotations.len())
        .map_err(|_| ClassFormatError::attribute("RuntimeVisibleAnnotations", "too many annotations"))?;

    let mut info = Vec::with_capacity(2 + annotations.len() * 4);
    info.write_u16::<BigEndian>(count)?;
    for annotation in annotations {
        let type_index = pool.add_utf8(&annotation_descriptor(annotation))?;
        info.write_u16::<BigEndian>(type_index)?;
        info.write_u16::<BigEndian>(0)?;
    }
    let name_index = pool.add_utf8("RuntimeVisibleAnnotations")?;
    Ok(vec![AttributeInfo { name_index, info }])
}

/// `a.b.Transient` → `La/b/Transient;`
fn annotation_descriptor(annotation: &str) -> String {
    format!("L{};", annotation.trim().replace('.', "/"))
}
