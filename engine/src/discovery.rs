use std::path::{Path, PathBuf};

const CANDIDATES: &[&str] = &[
    "/usr/local/bin/stockfish",
    "/usr/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
    "/usr/games/stockfish",
];

/// Locate a Stockfish executable.
///
/// An explicit path wins when it exists. Otherwise the usual install
/// locations are probed, then every directory on `PATH`.
pub fn find_engine(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!("Configured engine path {} does not exist", path.display());
    }

    let found = CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .or_else(|| search_path("stockfish"));

    match &found {
        Some(path) => tracing::info!("Found engine at: {}", path.display()),
        None => tracing::warn!("No Stockfish executable found"),
    }
    found
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
