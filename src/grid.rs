//! Memory-mapped view of a block maze file.
//!
//! The file is mapped read-write and edited in place: the solver reads
//! wall/open bytes during the search and stamps `*` along the computed path
//! afterwards. Only `#` blocks movement, so a previously solved file (with
//! `*` marks) parses and solves again to the same length.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::MmapMut;

const WALL: u8 = b'#';

/// A maze file mapped into memory.
///
/// Coordinates are `(x, y)` with `x` indexing columns and `y` indexing rows,
/// both starting at 0 in the top-left corner of the grid.
pub struct MazeFile {
    map: MmapMut,
    rows: i32,
    cols: i32,
    /// Byte offset of the first cell of each maze row.
    line_offsets: Vec<usize>,
}

impl MazeFile {
    /// Open and map a maze file, parsing the `<rows> <cols>` header and
    /// indexing the start of every maze line.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening maze file {}", path.display()))?;
        // SAFETY: the mapping is dropped before the file can be truncated by
        // this process, and concurrent external mutation is outside the
        // contract of a batch tool that owns its input.
        let map = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("mapping maze file {}", path.display()))?;

        let header_end = match map.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => bail!("maze file has no header line"),
        };
        let header =
            std::str::from_utf8(&map[..header_end]).context("maze header is not ASCII")?;
        let mut fields = header.split_whitespace();
        let rows: i32 = match fields.next() {
            Some(f) => f.parse().context("parsing row count")?,
            None => bail!("maze header is empty"),
        };
        let cols: i32 = match fields.next() {
            Some(f) => f.parse().context("parsing column count")?,
            None => bail!("maze header is missing the column count"),
        };
        if rows < 3 || cols < 3 {
            bail!("maze must be at least 3x3, got {rows}x{cols}");
        }

        // Walk the file newline by newline so a header shorter or longer
        // than expected cannot skew the row offsets.
        let mut line_offsets = Vec::with_capacity(rows as usize);
        let mut pos = 0usize;
        for row in 0..rows {
            match map[pos..].iter().position(|&b| b == b'\n') {
                Some(nl) => pos += nl + 1,
                None => bail!("maze file truncated before row {row}"),
            }
            if pos + cols as usize > map.len() {
                bail!("maze row {row} is shorter than {cols} columns");
            }
            line_offsets.push(pos);
            pos += cols as usize;
        }

        Ok(Self {
            map,
            rows,
            cols,
            line_offsets,
        })
    }

    #[inline(always)]
    pub fn rows(&self) -> i32 {
        self.rows
    }

    #[inline(always)]
    pub fn cols(&self) -> i32 {
        self.cols
    }

    /// Start cell: one step inside the top-left border corner.
    #[inline(always)]
    pub fn start(&self) -> (i32, i32) {
        (1, 1)
    }

    /// Goal cell: one step inside the bottom-right border corner.
    #[inline(always)]
    pub fn goal(&self) -> (i32, i32) {
        (self.cols - 2, self.rows - 2)
    }

    /// True for `#` cells and for anything outside the grid.
    #[inline(always)]
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
            return true;
        }
        self.byte(x, y) == WALL
    }

    #[inline(always)]
    pub fn byte(&self, x: i32, y: i32) -> u8 {
        debug_assert!(x >= 0 && x < self.cols && y >= 0 && y < self.rows);
        self.map[self.line_offsets[y as usize] + x as usize]
    }

    /// Overwrite the cell at `(x, y)` in the mapped file.
    #[inline(always)]
    pub fn mark(&mut self, x: i32, y: i32, byte: u8) {
        debug_assert!(x >= 0 && x < self.cols && y >= 0 && y < self.rows);
        self.map[self.line_offsets[y as usize] + x as usize] = byte;
    }

    /// Push the in-place edits back to the file.
    pub fn flush(&self) -> Result<()> {
        self.map.flush().context("flushing maze mapping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn maze_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp maze");
        file.write_all(body.as_bytes()).expect("write temp maze");
        file
    }

    #[test]
    fn parses_header_and_cells() {
        let file = maze_file("3 5\n#####\n#@ %#\n#####\n");
        let maze = MazeFile::open(file.path()).expect("open maze");
        assert_eq!(maze.rows(), 3);
        assert_eq!(maze.cols(), 5);
        assert_eq!(maze.start(), (1, 1));
        assert_eq!(maze.goal(), (3, 1));
        assert_eq!(maze.byte(1, 1), b'@');
        assert_eq!(maze.byte(3, 1), b'%');
        assert!(maze.is_wall(0, 0));
        assert!(!maze.is_wall(2, 1));
    }

    #[test]
    fn out_of_bounds_is_wall() {
        let file = maze_file("3 3\n###\n#@#\n###\n");
        let maze = MazeFile::open(file.path()).expect("open maze");
        assert!(maze.is_wall(-1, 1));
        assert!(maze.is_wall(1, -1));
        assert!(maze.is_wall(3, 1));
        assert!(maze.is_wall(1, 3));
    }

    #[test]
    fn marks_persist_through_flush() {
        let file = maze_file("3 5\n#####\n#@ %#\n#####\n");
        {
            let mut maze = MazeFile::open(file.path()).expect("open maze");
            maze.mark(2, 1, b'*');
            maze.flush().expect("flush maze");
        }
        let reread = std::fs::read_to_string(file.path()).expect("reread maze");
        assert_eq!(reread, "3 5\n#####\n#@*%#\n#####\n");
    }

    #[test]
    fn rejects_malformed_headers() {
        for body in ["\n", "5\n", "x y\n###\n", "2 2\n##\n##\n"] {
            let file = maze_file(body);
            assert!(MazeFile::open(file.path()).is_err(), "accepted {body:?}");
        }
    }

    #[test]
    fn rejects_truncated_rows() {
        let file = maze_file("3 5\n#####\n#@\n");
        assert!(MazeFile::open(file.path()).is_err());
    }
}
