//! Purpose: Shared mesh-library path resolution helpers.
//! Exports: `default_library_path`, `bootstrap_script_path`, and the layout constants.
//! Role: Keep CLI and ABI bootstrap resolution aligned from one source.
//! Invariants: Default library path is `$MESHLIB_PATH`, else the current directory.
//! Invariants: The bootstrap path is joined with the interpreter's separator, not the host's.

use std::path::PathBuf;

pub const LIBRARY_PATH_ENV: &str = "MESHLIB_PATH";
pub const BOOTSTRAP_DIR: &str = "meshlib";
pub const BOOTSTRAP_FILE: &str = "cstart.lua";

pub fn default_library_path() -> PathBuf {
    std::env::var_os(LIBRARY_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `library_path + sep + "meshlib" + sep + "cstart.lua"`, with `sep` taken from
/// the first character of Lua's `package.config`.
pub fn bootstrap_script_path(library_path: &str, separator: char) -> String {
    let mut path = String::with_capacity(
        library_path.len() + BOOTSTRAP_DIR.len() + BOOTSTRAP_FILE.len() + 2,
    );
    path.push_str(library_path);
    path.push(separator);
    path.push_str(BOOTSTRAP_DIR);
    path.push(separator);
    path.push_str(BOOTSTRAP_FILE);
    path
}

#[cfg(test)]
mod tests {
    use super::bootstrap_script_path;

    #[test]
    fn bootstrap_path_uses_given_separator() {
        assert_eq!(bootstrap_script_path(".", '/'), "./meshlib/cstart.lua");
        assert_eq!(
            bootstrap_script_path("C:\\fem", '\\'),
            "C:\\fem\\meshlib\\cstart.lua"
        );
    }

    #[test]
    fn bootstrap_path_keeps_trailing_separator_verbatim() {
        assert_eq!(
            bootstrap_script_path("/opt/fem/", '/'),
            "/opt/fem//meshlib/cstart.lua"
        );
    }
}
