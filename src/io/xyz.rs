// src/io/xyz.rs
//
// Multi-frame (extended) XYZ. Dataset files reach several gigabytes, so the
// file is scanned once for frame offsets and every request then seeks to a
// single frame.

use crate::error::{Result, ViewerError};
use crate::model::elements::normalize_symbol;
use crate::model::{Atom, Structure};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct FrameIndex {
    path: PathBuf,
    offsets: Vec<u64>,
    // 1-based line number of each frame header, for diagnostics
    lines: Vec<usize>,
    digest: String,
}

impl FrameIndex {
    pub fn build(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ViewerError::MissingFile { path: path.to_path_buf() });
        }
        let mut reader = BufReader::new(File::open(path)?);
        let mut hasher = blake3::Hasher::new();
        let mut offsets = Vec::new();
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        let mut pos: u64 = 0;
        let mut line_no = 0usize;

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf);
            line_no += 1;
            let header_pos = pos;
            pos += n as u64;

            let text = String::from_utf8_lossy(&buf);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let n_atoms: usize = trimmed.parse().map_err(|_| ViewerError::Xyz {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("expected atom count, found {:?}", truncate(trimmed)),
            })?;

            // Comment line plus one line per atom
            let frame_lines = n_atoms.checked_add(1).ok_or_else(|| ViewerError::Xyz {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("atom count {} is too large", n_atoms),
            })?;
            for _ in 0..frame_lines {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf)?;
                hasher.update(&buf);
                if n == 0 {
                    return Err(ViewerError::Xyz {
                        path: path.to_path_buf(),
                        line: line_no,
                        reason: format!("truncated frame {} ({} atoms declared)", offsets.len(), n_atoms),
                    });
                }
                pos += n as u64;
            }

            offsets.push(header_pos);
            lines.push(line_no);
            line_no = line_no.saturating_add(frame_lines);
        }

        let digest = hasher.finalize().to_hex()[..16].to_string();
        log::info!("Indexed {} frames in {} ({})", offsets.len(), path.display(), digest);
        Ok(Self { path: path.to_path_buf(), offsets, lines, digest })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Content digest of the whole file, taken while indexing.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Reads only frame `frame` from disk.
    pub fn read_frame(&self, frame: usize) -> Result<Structure> {
        let offset = *self.offsets.get(frame).ok_or_else(|| ViewerError::FrameOutOfRange {
            path: self.path.clone(),
            frame,
            count: self.offsets.len(),
        })?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        log::debug!("Reading frame {} of {} at byte {}", frame, self.path.display(), offset);

        parse_frame(&mut BufReader::new(file), &self.path, self.lines[frame])
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(40).collect()
}

/// Column layout of the per-atom lines.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Columns {
    species: usize,
    pos: usize,
    min_len: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Self { species: 0, pos: 1, min_len: 4 }
    }
}

/// Parses `Properties=species:S:1:pos:R:3:forces:R:3` into column offsets.
fn parse_properties(props: &str) -> Option<Columns> {
    let fields: Vec<&str> = props.split(':').collect();
    if fields.len() % 3 != 0 {
        return None;
    }
    let mut col = 0;
    let mut species = None;
    let mut pos = None;
    for chunk in fields.chunks(3) {
        let width: usize = chunk[2].parse().ok()?;
        match chunk[0].to_ascii_lowercase().as_str() {
            "species" | "element" => species = Some(col),
            "pos" | "positions" => pos = Some(col),
            _ => {}
        }
        col += width;
    }
    Some(Columns { species: species?, pos: pos?, min_len: col })
}

/// Finds `key=value` or `key="quoted value"` in an extended XYZ comment line.
fn comment_value<'a>(comment: &'a str, key: &str) -> Option<&'a str> {
    let mut search = comment;
    loop {
        let start = search.find(key)?;
        let before_ok = start == 0 || search[..start].ends_with(char::is_whitespace);
        let rest = &search[start + key.len()..];
        if before_ok {
            if let Some(rest) = rest.strip_prefix('=') {
                if let Some(quoted) = rest.strip_prefix('"') {
                    return quoted.find('"').map(|end| &quoted[..end]);
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                return Some(&rest[..end]);
            }
        }
        search = rest;
    }
}

/// Parses one frame starting at the reader's current position.
///
/// `first_line` is only used in error messages.
pub fn parse_frame<R: BufRead>(reader: &mut R, path: &Path, first_line: usize) -> Result<Structure> {
    let err = |line: usize, reason: String| ViewerError::Xyz { path: path.to_path_buf(), line, reason };

    let mut header = String::new();
    let mut line_no = first_line;
    loop {
        header.clear();
        if reader.read_line(&mut header)? == 0 {
            return Err(err(line_no, "Empty XYZ frame".to_string()));
        }
        if !header.trim().is_empty() {
            break;
        }
        line_no += 1;
    }
    let n_atoms: usize = header
        .trim()
        .parse()
        .map_err(|_| err(line_no, "Invalid atom count".to_string()))?;

    let mut comment = String::new();
    reader.read_line(&mut comment)?;

    let mut structure = Structure::new(Vec::with_capacity(n_atoms));

    // Format: Lattice="ax ay az bx by bz cx cy cz"
    if let Some(lat_str) = comment_value(&comment, "Lattice") {
        let parts: Vec<f64> = lat_str.split_whitespace().filter_map(|s| s.parse().ok()).collect();
        if parts.len() == 9 {
            structure.lattice = [
                [parts[0], parts[1], parts[2]],
                [parts[3], parts[4], parts[5]],
                [parts[6], parts[7], parts[8]],
            ];
            structure.has_cell = true;
            structure.pbc = [true; 3];
        }
    }
    if let Some(pbc) = comment_value(&comment, "pbc") {
        let flags: Vec<bool> = pbc.split_whitespace().map(|s| matches!(s, "T" | "True" | "1")).collect();
        if flags.len() == 3 {
            structure.pbc = [flags[0], flags[1], flags[2]];
        }
    }
    let cols = match comment_value(&comment, "Properties") {
        Some(props) => parse_properties(props)
            .ok_or_else(|| err(line_no + 1, format!("unsupported Properties={}", props)))?,
        None => Columns::default(),
    };

    let mut line = String::new();
    for i in 0..n_atoms {
        line.clear();
        let at = line_no + 2 + i;
        if reader.read_line(&mut line)? == 0 {
            return Err(err(at, format!("expected {} atoms, found {}", n_atoms, i)));
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < cols.min_len {
            return Err(err(at, format!("expected {} columns, found {}", cols.min_len, parts.len())));
        }

        let coord = |k: usize| -> Result<f64> {
            parts[cols.pos + k]
                .parse()
                .map_err(|_| err(at, format!("Invalid coordinate {:?}", parts[cols.pos + k])))
        };

        structure.atoms.push(Atom {
            element: normalize_symbol(parts[cols.species]),
            position: [coord(0)?, coord(1)?, coord(2)?],
        });
    }

    Ok(structure)
}

/// Appends one structure as an extended XYZ frame.
pub fn write_frame<W: Write>(out: &mut W, structure: &Structure) -> io::Result<()> {
    writeln!(out, "{}", structure.atoms.len())?;
    if structure.has_cell {
        let l = structure.lattice;
        let pbc: Vec<&str> = structure.pbc.iter().map(|&p| if p { "T" } else { "F" }).collect();
        writeln!(
            out,
            "Lattice=\"{} {} {} {} {} {} {} {} {}\" Properties=species:S:1:pos:R:3 pbc=\"{}\"",
            l[0][0], l[0][1], l[0][2], l[1][0], l[1][1], l[1][2], l[2][0], l[2][1], l[2][2],
            pbc.join(" ")
        )?;
    } else {
        writeln!(out, "Properties=species:S:1:pos:R:3")?;
    }
    for atom in &structure.atoms {
        writeln!(
            out,
            "{:<3} {:>14.8} {:>14.8} {:>14.8}",
            atom.element, atom.position[0], atom.position[1], atom.position[2]
        )?;
    }
    Ok(())
}

pub fn write(path: &str, frames: &[Structure]) -> io::Result<()> {
    let mut out = io::BufWriter::new(File::create(path)?);
    for s in frames {
        write_frame(&mut out, s)?;
    }
    out.flush()
}
