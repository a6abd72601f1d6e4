use std::path::{Path, PathBuf};

/// Expands a configured path, replacing a leading `~` or `$HOME` with the
/// user's home directory. Relative results are joined onto `base`.
pub fn expand_path(input: &str, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_home(input));
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

fn expand_home(input: &str) -> String {
    if input == "~" || input.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return input.replacen('~', &home.to_string_lossy(), 1);
        }
    } else if input.starts_with("$HOME") {
        if let Some(home) = dirs::home_dir() {
            return input.replacen("$HOME", &home.to_string_lossy(), 1);
        }
    }
    input.into()
}
