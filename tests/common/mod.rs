//
// common/mod.rs
// dcm-bids
//
// Shared fixtures for integration tests: synthetic DICOM instances and source trees.
//
// Thales Matheus Mendonça Santos - November 2025

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;

pub const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";

/// Write a tiny MR instance belonging to series `series_number`.
pub fn write_test_dicom(path: &Path, series_number: u32, description: &str, instance: u32) {
    let series_uid = format!("1.2.826.0.1.3680043.2.1125.{series_number}");
    let sop_uid = format!("{series_uid}.{instance}");

    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    let put = |obj: &mut InMemDicomObject<StandardDataDictionary>, tag, vr, value: PrimitiveValue| {
        obj.put(DataElement::new(tag, vr, value));
    };
    put(&mut obj, Tag(0x0010, 0x0010), VR::PN, PrimitiveValue::from("Test^Patient"));
    put(&mut obj, Tag(0x0010, 0x0020), VR::LO, PrimitiveValue::from("ER0009"));
    put(&mut obj, Tag(0x0008, 0x0060), VR::CS, PrimitiveValue::from("MR"));
    put(&mut obj, Tag(0x0008, 0x0020), VR::DA, PrimitiveValue::from("20220308"));
    put(&mut obj, Tag(0x0008, 0x1030), VR::LO, PrimitiveValue::from("EmoRep"));
    put(&mut obj, Tag(0x0008, 0x0016), VR::UI, PrimitiveValue::from(MR_IMAGE_STORAGE));
    put(&mut obj, Tag(0x0008, 0x0018), VR::UI, PrimitiveValue::from(sop_uid.as_str()));
    put(&mut obj, Tag(0x0020, 0x000E), VR::UI, PrimitiveValue::from(series_uid.as_str()));
    put(
        &mut obj,
        Tag(0x0020, 0x0011),
        VR::IS,
        PrimitiveValue::from(series_number.to_string()),
    ); // Series Number
    put(&mut obj, Tag(0x0008, 0x103E), VR::LO, PrimitiveValue::from(description)); // Series Description
    put(&mut obj, Tag(0x0018, 0x1030), VR::LO, PrimitiveValue::from(description)); // Protocol Name

    put(&mut obj, Tag(0x0028, 0x0010), VR::US, PrimitiveValue::from(2_u16)); // Rows
    put(&mut obj, Tag(0x0028, 0x0011), VR::US, PrimitiveValue::from(2_u16)); // Columns
    put(&mut obj, Tag(0x0028, 0x0002), VR::US, PrimitiveValue::from(1_u16)); // Samples per pixel
    put(&mut obj, Tag(0x0028, 0x0100), VR::US, PrimitiveValue::from(8_u16)); // Bits Allocated
    put(&mut obj, Tag(0x0028, 0x0101), VR::US, PrimitiveValue::from(8_u16)); // Bits Stored
    put(&mut obj, Tag(0x0028, 0x0102), VR::US, PrimitiveValue::from(7_u16)); // High Bit
    put(&mut obj, Tag(0x0028, 0x0103), VR::US, PrimitiveValue::from(0_u16)); // Pixel Representation
    put(&mut obj, Tag(0x0028, 0x0004), VR::CS, PrimitiveValue::from("MONOCHROME2"));
    put(
        &mut obj,
        Tag(0x7fe0, 0x0010),
        VR::OB,
        PrimitiveValue::from(vec![0_u8, 64, 128, 255]),
    );

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(MR_IMAGE_STORAGE)
        .media_storage_sop_instance_uid(sop_uid.as_str())
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    file_obj.write_to_file(path).expect("write test dicom");
}

pub const MOVIES_LOG: &str = "\
trial,type,onset,end_time,stimdescrip
0,instructions,,,welcome
1,fixation,0,10,cross
2,movie,10,130,clip_01.mp4
3,fixation,130,140,cross
";

/// `sourcedata/<subject>/day2_movies/{DICOM,Scanner_behav}` with one DICOM file and one run log.
pub fn build_source_tree(source_dir: &Path, subject: &str) -> PathBuf {
    let session_dir = source_dir.join(subject).join("day2_movies");
    write_test_dicom(&session_dir.join("DICOM/IM0001"), 2, "T1w_MPRAGE", 1);

    let behav = session_dir.join("Scanner_behav");
    fs::create_dir_all(&behav).expect("mkdir behav");
    fs::write(behav.join(format!("{subject}_movies_run-1_20220308.csv")), MOVIES_LOG)
        .expect("write log");
    session_dir
}
