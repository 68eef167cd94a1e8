use anyhow::{bail, Context, Result};
use bimaze::{solve, MazeFile, SolverConfig};

fn parse_args() -> Result<(String, SolverConfig)> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SolverConfig::default();
    let mut path = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--threads" => {
                i += 1;
                let n: usize = match args.get(i) {
                    Some(arg) => arg
                        .parse()
                        .context("--threads requires a positive integer")?,
                    None => bail!("--threads requires a positive integer"),
                };
                config = config.thread_count(n);
            }
            arg if path.is_none() => path = Some(arg.to_string()),
            arg => bail!("unexpected argument: {arg}\nusage: astar [--threads N] <maze-file>"),
        }
        i += 1;
    }
    match path {
        Some(path) => Ok((path, config)),
        None => bail!("usage: astar [--threads N] <maze-file>"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let (path, config) = parse_args()?;

    let mut maze = MazeFile::open(&path)?;
    let summary = solve(&mut maze, &config)?;
    maze.flush()?;

    println!("{}", summary.steps);
    Ok(())
}
