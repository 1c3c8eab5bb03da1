use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::adapters::FunctionRuntime;

pub const FUNCTION_DESCRIPTION: &str = "Lambda function for echoing hello world";

const INLINE_SOURCE_FILE: &str = "lambda_function.py";
const INLINE_HANDLER: &str = "lambda_function.lambda_handler";
const BOOTSTRAP_HANDLER: &str = "bootstrap";

const INLINE_SOURCE: &str = r#"
def lambda_handler(event, context):
    print("------------------------")
    print(event)
    print(context)
    print("------------------------")
    return "hello world"
"#;

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("failed to read function archive '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("function archive '{}' is empty", .path.display())]
    Empty { path: PathBuf },
    #[error("failed to build function archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write function archive: {0}")]
    Write(#[from] std::io::Error),
}

/// Code deployed as the API backend.
#[derive(Clone, PartialEq, Eq)]
pub enum FunctionPackage {
    /// The Python echo handler, zipped in memory.
    InlinePython,
    /// A zip holding a `bootstrap` executable for the custom runtime.
    Prebuilt { zip: Vec<u8> },
}

impl std::fmt::Debug for FunctionPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InlinePython => f.write_str("InlinePython"),
            Self::Prebuilt { zip } => f
                .debug_struct("Prebuilt")
                .field("zip_bytes", &zip.len())
                .finish(),
        }
    }
}

impl FunctionPackage {
    pub fn from_zip_file(path: &Path) -> Result<Self, PackagingError> {
        let zip = std::fs::read(path).map_err(|source| PackagingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if zip.is_empty() {
            return Err(PackagingError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::Prebuilt { zip })
    }

    pub fn runtime(&self) -> FunctionRuntime {
        match self {
            Self::InlinePython => FunctionRuntime::Python311,
            Self::Prebuilt { .. } => FunctionRuntime::ProvidedAl2023,
        }
    }

    pub fn handler(&self) -> &'static str {
        match self {
            Self::InlinePython => INLINE_HANDLER,
            Self::Prebuilt { .. } => BOOTSTRAP_HANDLER,
        }
    }

    pub fn archive(&self) -> Result<Vec<u8>, PackagingError> {
        match self {
            Self::InlinePython => inline_python_zip(),
            Self::Prebuilt { zip } => Ok(zip.clone()),
        }
    }
}

fn inline_python_zip() -> Result<Vec<u8>, PackagingError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(INLINE_SOURCE_FILE, options)?;
    zip.write_all(INLINE_SOURCE.as_bytes())?;
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn inline_archive_holds_the_python_handler() {
        let package = FunctionPackage::InlinePython;
        let bytes = package.archive().expect("zip builds");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        assert_eq!(archive.len(), 1);
        let mut source = String::new();
        archive
            .by_name("lambda_function.py")
            .expect("handler file present")
            .read_to_string(&mut source)
            .expect("utf-8 source");
        assert!(source.contains("def lambda_handler(event, context):"));
        assert!(source.contains("return \"hello world\""));

        assert_eq!(package.handler(), "lambda_function.lambda_handler");
        assert_eq!(package.runtime(), FunctionRuntime::Python311);
    }

    #[test]
    fn prebuilt_archive_uses_custom_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("function.zip");
        std::fs::write(&path, b"PK\x03\x04").expect("write");

        let package = FunctionPackage::from_zip_file(&path).expect("readable");
        assert_eq!(package.handler(), "bootstrap");
        assert_eq!(package.runtime(), FunctionRuntime::ProvidedAl2023);
        assert_eq!(package.archive().expect("bytes"), b"PK\x03\x04".to_vec());
    }

    #[test]
    fn empty_or_missing_archives_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.zip");
        std::fs::write(&empty, b"").expect("write");

        assert!(matches!(
            FunctionPackage::from_zip_file(&empty),
            Err(PackagingError::Empty { .. })
        ));
        assert!(matches!(
            FunctionPackage::from_zip_file(&dir.path().join("absent.zip")),
            Err(PackagingError::Read { .. })
        ));
    }
}
