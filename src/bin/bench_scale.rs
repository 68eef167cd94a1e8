use std::time::Instant;

use anyhow::Result;
use bimaze::{solve, MazeFile, SolverConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZE: usize = 512;
const WALL_DENSITY: f64 = 0.25;

/// Random maze with a carved L corridor so every run is solvable.
fn generate_maze() -> String {
    let mut rng = StdRng::seed_from_u64(0x5EED_BEEF_CAFE_0042);
    let mut rows: Vec<Vec<u8>> = (0..SIZE)
        .map(|y| {
            (0..SIZE)
                .map(|x| {
                    let border = x == 0 || y == 0 || x == SIZE - 1 || y == SIZE - 1;
                    if border || rng.gen_bool(WALL_DENSITY) {
                        b'#'
                    } else {
                        b' '
                    }
                })
                .collect()
        })
        .collect();
    for x in 1..SIZE - 1 {
        rows[1][x] = b' ';
    }
    for y in 1..SIZE - 1 {
        rows[y][SIZE - 2] = b' ';
    }
    rows[1][1] = b'@';
    rows[SIZE - 2][SIZE - 2] = b'%';

    let mut body = format!("{SIZE} {SIZE}\n");
    for row in &rows {
        body.push_str(std::str::from_utf8(row).expect("maze rows are ASCII"));
        body.push('\n');
    }
    body
}

fn main() -> Result<()> {
    let body = generate_maze();
    let path = std::env::temp_dir().join("bench_scale.maze");

    let max_threads = std::thread::available_parallelism().map_or(8, usize::from);
    let mut thread_counts = vec![1usize, 2, 4, 8];
    thread_counts.retain(|&n| n <= max_threads);
    if !thread_counts.contains(&max_threads) {
        thread_counts.push(max_threads);
    }

    println!("{SIZE}x{SIZE} maze, wall density {WALL_DENSITY}");
    for threads in thread_counts {
        // Fresh file per run: a solved maze carries path marks.
        std::fs::write(&path, &body)?;
        let mut maze = MazeFile::open(&path)?;
        let config = SolverConfig::default().thread_count(threads);
        let start = Instant::now();
        let summary = solve(&mut maze, &config)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        println!(
            "threads {threads:>3}: {elapsed_ms:>9.3} ms, {} steps",
            summary.steps
        );
    }
    std::fs::remove_file(&path)?;
    Ok(())
}
