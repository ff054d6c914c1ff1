// DICOM image reading/writing; the only codec that delegates file access entirely to its library.
use std::path::Path;

use dicom_core::Tag;
use dicom_object::{DefaultDicomObject, OpenFileOptions};

use crate::core::error::{Error, ErrorKind};

pub type MedicalImage = DefaultDicomObject;

const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImageOptions {
    /// Stop parsing at the Pixel Data element, keeping only the header.
    pub skip_pixel_data: bool,
}

pub fn read_image(path: &Path, options: ImageOptions) -> Result<MedicalImage, Error> {
    // The reader reports a missing file as a parse failure; classify it first.
    std::fs::metadata(path).map_err(|err| Error::io(path, err))?;

    let mut open = OpenFileOptions::new();
    if options.skip_pixel_data {
        open = open.read_until(PIXEL_DATA);
    }
    open.open_file(path).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("failed to read DICOM file")
            .with_path(path)
            .with_source(err)
    })
}

pub fn write_image(image: &MedicalImage, path: &Path) -> Result<(), Error> {
    image.write_to_file(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write DICOM file")
            .with_path(path)
            .with_source(err)
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

    use super::MedicalImage;

    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);

    pub fn secondary_capture(patient: &str) -> MedicalImage {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from(patient),
        ));
        obj.put(DataElement::new(
            Tag(0x0008, 0x0016),
            VR::UI,
            PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.7"),
        ));
        obj.put(DataElement::new(
            Tag(0x0008, 0x0018),
            VR::UI,
            PrimitiveValue::from("2.25.1234567890"),
        ));
        obj.with_meta(
            FileMetaTableBuilder::new()
                .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
                .media_storage_sop_instance_uid("2.25.1234567890")
                .transfer_syntax("1.2.840.10008.1.2.1"),
        )
        .expect("file meta")
    }
}
