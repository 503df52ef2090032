//! Cell-offset lookahead table
//!
//! `LINE_TABLE[dz + 5][dx + 5]` lists the move squares (relative to the
//! current one) that a straight line from the centre of the current square
//! to the centre of the square at `(dx, dz)` crosses, excluding both end
//! squares. Built once on first use and read-only afterwards.

use once_cell::sync::Lazy;

/// Offsets covered in each direction.
pub const LINE_TABLE_REACH: i32 = 5;

const LINE_TABLE_SIZE: usize = (LINE_TABLE_REACH * 2 + 1) as usize;

type LineTable = Vec<Vec<Vec<(i32, i32)>>>;

static LINE_TABLE: Lazy<LineTable> = Lazy::new(build_line_table);

/// Squares crossed between the current square and one at `(dx, dz)`.
/// `None` when the offset is outside the table.
pub fn crossed_cells(dx: i32, dz: i32) -> Option<&'static [(i32, i32)]> {
    if dx.abs() > LINE_TABLE_REACH || dz.abs() > LINE_TABLE_REACH {
        return None;
    }
    let row = (dz + LINE_TABLE_REACH) as usize;
    let col = (dx + LINE_TABLE_REACH) as usize;
    Some(LINE_TABLE[row][col].as_slice())
}

fn build_line_table() -> LineTable {
    let mut table = vec![vec![Vec::new(); LINE_TABLE_SIZE]; LINE_TABLE_SIZE];
    for (zt, row) in table.iter_mut().enumerate() {
        for (xt, cells) in row.iter_mut().enumerate() {
            let dx = xt as i32 - LINE_TABLE_REACH;
            let dz = zt as i32 - LINE_TABLE_REACH;
            *cells = trace_line(dx, dz);
        }
    }
    table
}

/// Grid traversal from (0.5, 0.5) to (dx + 0.5, dz + 0.5).
fn trace_line(dx: i32, dz: i32) -> Vec<(i32, i32)> {
    let mut cells = Vec::new();
    if dx == 0 {
        let step = dz.signum();
        let mut a = step;
        while a != dz && step != 0 {
            cells.push((0, a));
            a += step;
        }
        return cells;
    }
    if dz == 0 {
        let step = dx.signum();
        let mut a = step;
        while a != dx {
            cells.push((a, 0));
            a += step;
        }
        return cells;
    }

    let start = (0.5f32, 0.5f32);
    let dir = (dx as f32, dz as f32);
    let (mut xp, mut zp) = start;
    let max_steps = (dx.abs() + dz.abs() + 2) * 2;
    for _ in 0..max_steps {
        let xn = if dir.0 > 0.0 {
            (xp.floor() + 1.0 - xp) / dir.0
        } else {
            (xp.floor() - xp) / dir.0
        };
        let zn = if dir.1 > 0.0 {
            (zp.floor() + 1.0 - zp) / dir.1
        } else {
            (zp.floor() - zp) / dir.1
        };
        let t = xn.min(zn) + 0.0001;
        xp += t * dir.0;
        zp += t * dir.1;
        let cell = (xp.floor() as i32, zp.floor() as i32);
        if cell == (dx, dz) || cell.0.abs() > dx.abs() || cell.1.abs() > dz.abs() {
            break;
        }
        if !cells.contains(&cell) {
            cells.push(cell);
        }
    }
    cells
}
