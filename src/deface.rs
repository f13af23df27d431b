//
// deface.rs
// dcm-bids
//
// Writes defaced copies of T1w images under a parallel derivatives tree using an external defacing tool.
//
// Thales Matheus Mendonça Santos - November 2025

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::convert::nifti_stem;
use crate::error::{Error, Result};
use crate::external::run_tool;

/// Anything that can write a defaced copy of `input` to `output`.
pub trait Defacer {
    fn deface(&self, input: &Path, output: &Path) -> Result<()>;
}

/// `pydeface` backend.
#[derive(Debug, Clone)]
pub struct Pydeface {
    binary: PathBuf,
}

impl Pydeface {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Defacer for Pydeface {
    fn deface(&self, input: &Path, output: &Path) -> Result<()> {
        let args: [&OsStr; 4] = [
            input.as_os_str(),
            OsStr::new("--outfile"),
            output.as_os_str(),
            OsStr::new("--force"),
        ];
        run_tool(&self.binary, args)?;
        Ok(())
    }
}

/// `<root>/deface/sub-<ID>/<session>`.
pub fn deface_dir(root: &Path, subject: &str, session: &str) -> PathBuf {
    root.join("deface").join(format!("sub-{subject}")).join(session)
}

/// Deface each T1w image into `<root>/deface/sub-<ID>/<session>/<stem>_defaced.nii.gz`.
///
/// Originals are never touched. Returns the defaced paths in input order.
pub fn deface<D: Defacer + ?Sized>(
    defacer: &D,
    t1w_list: &[PathBuf],
    root: &Path,
    subject: &str,
    session: &str,
) -> Result<Vec<PathBuf>> {
    let out_dir = deface_dir(root, subject, session);
    fs::create_dir_all(&out_dir).map_err(|e| Error::io(&out_dir, e))?;

    let mut defaced = Vec::with_capacity(t1w_list.len());
    for t1w in t1w_list {
        let stem = nifti_stem(t1w).ok_or_else(|| {
            Error::InvalidInput(format!("{} is not a NIfTI file", t1w.display()))
        })?;
        let output = out_dir.join(format!("{stem}_defaced.nii.gz"));
        if output == *t1w {
            return Err(Error::InvalidInput(format!(
                "defaced output would overwrite {}",
                t1w.display()
            )));
        }

        info!(input = %t1w.display(), output = %output.display(), "defacing");
        defacer.deface(t1w, &output)?;

        if !output.is_file() {
            return Err(Error::OutputValidation(format!(
                "defacing reported success but {} was not written",
                output.display()
            )));
        }
        defaced.push(output);
    }

    Ok(defaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingDefacer {
        calls: RefCell<Vec<(PathBuf, PathBuf)>>,
        write_output: bool,
    }

    impl Defacer for RecordingDefacer {
        fn deface(&self, input: &Path, output: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((input.to_path_buf(), output.to_path_buf()));
            if self.write_output {
                fs::write(output, b"defaced").map_err(|e| Error::io(output, e))?;
            }
            Ok(())
        }
    }

    #[test]
    fn writes_into_parallel_tree() {
        let dir = tempdir().expect("tempdir");
        let t1w = dir.path().join("sub-ER0009_ses-day2_T1w.nii.gz");
        fs::write(&t1w, b"original").expect("write");

        let defacer = RecordingDefacer {
            write_output: true,
            ..Default::default()
        };
        let out = deface(&defacer, &[t1w.clone()], dir.path(), "ER0009", "ses-day2")
            .expect("deface");

        let expected = dir
            .path()
            .join("deface/sub-ER0009/ses-day2/sub-ER0009_ses-day2_T1w_defaced.nii.gz");
        assert_eq!(out, vec![expected.clone()]);
        assert_eq!(defacer.calls.borrow()[0], (t1w.clone(), expected));
        assert_eq!(fs::read(&t1w).expect("read"), b"original");
    }

    #[test]
    fn missing_output_is_a_validation_error() {
        let dir = tempdir().expect("tempdir");
        let t1w = dir.path().join("sub-ER0009_ses-day2_T1w.nii.gz");
        fs::write(&t1w, b"original").expect("write");

        let defacer = RecordingDefacer::default();
        let err = deface(&defacer, &[t1w], dir.path(), "ER0009", "ses-day2").unwrap_err();
        assert!(matches!(err, Error::OutputValidation(_)));
    }

    #[test]
    fn non_nifti_input_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let defacer = RecordingDefacer::default();
        let err = deface(
            &defacer,
            &[dir.path().join("anat.json")],
            dir.path(),
            "ER0009",
            "ses-day2",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(defacer.calls.borrow().is_empty());
    }
}

#[cfg(all(test, unix))]
mod tool_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn pydeface_receives_the_documented_arguments() {
        let dir = tempdir().expect("tempdir");
        let log = dir.path().join("argv.txt");
        let script = dir.path().join("fake-pydeface");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\ncp \"$1\" \"$3\"\n",
                log.display()
            ),
        )
        .expect("write script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let t1w = dir.path().join("sub-ER0009_ses-day2_T1w.nii.gz");
        fs::write(&t1w, b"original").expect("write");

        let out = deface(
            &Pydeface::new(&script),
            &[t1w.clone()],
            dir.path(),
            "ER0009",
            "ses-day2",
        )
        .expect("deface");

        let argv = fs::read_to_string(&log).expect("read argv");
        let expected = [
            t1w.to_string_lossy().into_owned(),
            "--outfile".to_string(),
            out[0].to_string_lossy().into_owned(),
            "--force".to_string(),
        ]
        .join("\n");
        assert_eq!(argv.trim_end(), expected);
        assert_eq!(fs::read(&out[0]).expect("read"), b"original");
    }

    #[test]
    fn missing_pydeface_is_a_launch_error() {
        let dir = tempdir().expect("tempdir");
        let t1w = dir.path().join("sub-ER0009_ses-day2_T1w.nii.gz");
        fs::write(&t1w, b"original").expect("write");

        let err = deface(
            &Pydeface::new(dir.path().join("no-such-pydeface")),
            &[t1w],
            dir.path(),
            "ER0009",
            "ses-day2",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolLaunch { .. }));
    }
}
