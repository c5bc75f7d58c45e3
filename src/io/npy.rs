// src/io/npy.rs
//
// Embedding arrays come out of numpy pipelines in whatever dtype the
// reducer produced (UMAP gives f32, some scripts save f64; labels are
// usually i64 but may be i32). Each reader tries the common dtypes in turn.

use crate::error::{Result, ViewerError};
use ndarray::{Array1, Array2};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(ViewerError::MissingFile { path: path.to_path_buf() });
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Runs each reader until one accepts the file's dtype.
fn read_any<T>(path: &Path, readers: &[fn(BufReader<File>) -> std::result::Result<T, ReadNpyError>]) -> Result<T> {
    let mut last = None;
    for read in readers {
        match read(open(path)?) {
            Ok(v) => return Ok(v),
            Err(ReadNpyError::WrongDescriptor(d)) => last = Some(ReadNpyError::WrongDescriptor(d)),
            Err(e) => {
                return Err(ViewerError::Array { path: path.to_path_buf(), source: e });
            }
        }
    }
    match last {
        Some(source) => Err(ViewerError::Array { path: path.to_path_buf(), source }),
        None => Err(ViewerError::Shape {
            path: path.to_path_buf(),
            reason: "no reader for this dtype".to_string(),
        }),
    }
}

/// Reads an `N x 3` (or wider; extra columns ignored) coordinate array.
pub fn read_points(path: &Path) -> Result<Vec<[f64; 3]>> {
    let arr: Array2<f64> = read_any(
        path,
        &[
            |r| Array2::<f64>::read_npy(r),
            |r| Array2::<f32>::read_npy(r).map(|a| a.mapv(f64::from)),
        ],
    )?;

    if arr.ncols() < 3 {
        return Err(ViewerError::Shape {
            path: path.to_path_buf(),
            reason: format!("expected at least 3 columns, found {}", arr.ncols()),
        });
    }

    Ok(arr.rows().into_iter().map(|row| [row[0], row[1], row[2]]).collect())
}

/// Reads a 1-D integer array (cluster labels or dataset indices).
/// u64 values above `i64::MAX` are a shape error.
pub fn read_integers(path: &Path) -> Result<Vec<i64>> {
    let arr: Array1<i128> = read_any(
        path,
        &[
            |r| Array1::<i64>::read_npy(r).map(|a| a.mapv(i128::from)),
            |r| Array1::<i32>::read_npy(r).map(|a| a.mapv(i128::from)),
            |r| Array1::<u32>::read_npy(r).map(|a| a.mapv(i128::from)),
            |r| Array1::<u64>::read_npy(r).map(|a| a.mapv(i128::from)),
        ],
    )?;
    arr.iter()
        .enumerate()
        .map(|(row, &v)| {
            i64::try_from(v).map_err(|_| ViewerError::Shape {
                path: path.to_path_buf(),
                reason: format!("integer {} at row {} does not fit in i64", v, row),
            })
        })
        .collect()
}

/// Reads dataset indices; negative values cannot address a frame.
pub fn read_indices(path: &Path) -> Result<Vec<usize>> {
    read_integers(path)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            usize::try_from(v).map_err(|_| ViewerError::Shape {
                path: path.to_path_buf(),
                reason: format!("negative dataset index {} at row {}", v, row),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::WriteNpyExt;

    fn write<A: WriteNpyExt>(dir: &Path, name: &str, arr: &A) -> std::path::PathBuf {
        let path = dir.join(name);
        arr.write_npy(File::create(&path).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_reads_f32_points() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "e.npy", &array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let pts = read_points(&p).unwrap();
        assert_eq!(pts, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_rejects_two_columns() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "e.npy", &array![[1.0f64, 2.0], [4.0, 5.0]]);
        assert!(matches!(read_points(&p), Err(ViewerError::Shape { .. })));
    }

    #[test]
    fn test_reads_i32_labels() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "l.npy", &array![0i32, -1, 3]);
        assert_eq!(read_integers(&p).unwrap(), vec![0, -1, 3]);
        assert!(read_indices(&p).is_err());
    }

    #[test]
    fn test_u64_beyond_i64_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write(dir.path(), "ok.npy", &array![0u64, 7, i64::MAX as u64]);
        assert_eq!(read_integers(&ok).unwrap(), vec![0, 7, i64::MAX]);

        let big = write(dir.path(), "big.npy", &array![1u64, u64::MAX]);
        match read_indices(&big) {
            Err(ViewerError::Shape { reason, .. }) => assert!(reason.contains("row 1"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_points(Path::new("/definitely/not/here.npy")).unwrap_err();
        assert!(err.to_string().contains("here.npy"));
    }
}
