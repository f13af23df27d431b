use std::path::Path;

use dicom::core::Tag;
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{DefaultDicomObject, InMemDicomObject, OpenFileOptions};

use crate::error::{Error, Result};

/// Small helper trait to pull typed values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_i32(&self, tag: Tag) -> Option<i32>;
    fn has_element(&self, tag: Tag) -> bool;
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn element_i32(&self, tag: Tag) -> Option<i32> {
        self.element(tag).ok().and_then(|e| e.to_int::<i32>().ok())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn element_i32(&self, tag: Tag) -> Option<i32> {
        self.element(tag).ok().and_then(|e| e.to_int::<i32>().ok())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

/// Open a DICOM file, stopping before the pixel data so whole series can be scanned cheaply.
pub fn open_header(path: &Path) -> Result<DefaultDicomObject> {
    OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|e| Error::Dicom {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
